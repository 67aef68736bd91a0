//! Error taxonomy of the reward engine.
//!
//! Two distinct severities, encoded in the types rather than in strings:
//!
//! - [`ChainError`] is fatal to the block. The orchestrator propagates it and
//!   the surrounding store transaction is dropped, so no partial writes
//!   survive.
//! - [`PayoutError`] is per payout entry. The payout engine collects them and
//!   keeps going; a non-empty list only suppresses pruning for that topic.

use cortex_common::{Int, MathError};
use thiserror::Error;

use crate::types::TopicId;

/// Fatal errors. Propagating one of these aborts the block and rolls back
/// every write made while processing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Underlying keyed-store failure.
    #[error("store: {0}")]
    Store(String),

    /// A persisted record failed to encode or decode.
    #[error("codec: {0}")]
    Codec(String),

    /// Deterministic arithmetic failure (overflow, divide by zero, bad log).
    #[error("math: {0}")]
    Math(#[from] MathError),

    /// The splitter produced no reward for a winning topic.
    #[error("invalid reward for topic {0}")]
    InvalidReward(TopicId),

    /// A referenced topic is not registered.
    #[error("unknown topic {0}")]
    UnknownTopic(TopicId),

    /// A record required for settlement is missing.
    #[error("missing record: {0}")]
    MissingRecord(String),

    /// Module/account ledger failure surfaced on a fatal path.
    #[error("bank: {0}")]
    Bank(#[from] BankError),
}

/// Ledger failures. Whether one is fatal depends on the call site: the payout
/// engine collects them per entry, everything else propagates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("insufficient funds in {account}: have {available}, need {needed}")]
    InsufficientFunds {
        account: String,
        available: Int,
        needed: Int,
    },

    #[error("negative transfer amount {amount}")]
    NegativeAmount { amount: Int },

    #[error("balance overflow in {account}")]
    BalanceOverflow { account: String },
}

/// One failed payout entry. Collected, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("payout to {address} in topic {topic_id} failed: {kind}")]
pub struct PayoutError {
    pub topic_id: TopicId,
    pub address: String,
    pub kind: PayoutErrorKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayoutErrorKind {
    /// Rewards→staking module transfer failed; no stake was credited.
    #[error("module transfer: {0}")]
    Transfer(BankError),

    /// Module transfer succeeded but the stake credit failed. Tokens are
    /// parked in the staking module without attribution; tolerated, the
    /// entry is recorded for audit.
    #[error("stake credit after successful transfer: {0}")]
    StakeCredit(String),

    /// The payout address did not decode.
    #[error("bad payout address: {0}")]
    BadAddress(String),

    /// Rewards→account transfer failed.
    #[error("account transfer: {0}")]
    AccountTransfer(BankError),
}
