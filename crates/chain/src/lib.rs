//! # Cortex Chain — Per-Block Reward Distribution Engine
//!
//! Consensus-critical settlement pipeline of the Cortex inference
//! marketplace: at each block boundary it selects which topics pay out,
//! apportions every topic's reward among its reputers, inferers and
//! forecasters by score-derived entropy-weighted fractions, settles the
//! token movements, and prunes consumed records. Every validator must
//! compute bit-identical results from identical inputs, so there is no
//! floating point, no unordered iteration, and no wall-clock anywhere in
//! this crate.
//!
//! ## Module Overview
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | `types`     | Topics, loss bundles, task rewards, addresses |
//! | `params`    | Module parameters and validation |
//! | `ctx`       | Block context: height, parameter snapshot, logging |
//! | `error`     | Fatal vs collected error taxonomy |
//! | `store`     | Ordered keyed store with block-scoped transactions |
//! | `keeper`    | Capability traits and their store-backed implementation |
//! | `topics`    | Topic weight, activation gate, revenue carry-forward |
//! | `skim`      | Deterministic top-N selection with seeded tie-break |
//! | `scores`    | Inferer / forecaster / reputer scores from loss bundles |
//! | `fractions` | Logistic reward fractions and EMA-smoothed task entropy |
//! | `split`     | Task splitter and per-actor reward fan-out |
//! | `payout`    | Token movement with per-entry error collection |
//! | `prune`     | Bounded record pruning after settlement |
//! | `rewards`   | The per-block driver tying everything together |
//! | `mint`      | Emission schedule feeding the rewards account |
//!
//! ## Block processing pipeline (order is consensus-critical)
//!
//! ```text
//! 1. total reward   ← rewards module balance
//! 2. weights        ← stake^μ · (revenue/epoch)^ν per active topic
//! 3. filter         → drop nonce-less topics, inactivate underweight ones
//! 4. skim           → top-N by weight, SHA3-seeded tie-break
//! 5. split          → per-topic reward, then per-task, then per-actor
//! 6. payout         → reputers to stake, workers to accounts
//! 7. prune          → records behind the oldest unfulfilled nonce − margin
//! ```
//!
//! Fatal errors abort the block and the enclosing store transaction rolls
//! everything back; per-topic and per-payout failures are logged, skipped
//! and never poison other topics.

pub mod ctx;
pub mod error;
pub mod fractions;
pub mod keeper;
pub mod mint;
pub mod params;
pub mod payout;
pub mod prune;
pub mod rewards;
pub mod scores;
pub mod skim;
pub mod split;
pub mod store;
pub mod topics;
pub mod types;

#[cfg(test)]
mod e2e_tests;

pub use ctx::BlockCtx;
pub use error::{BankError, ChainError, PayoutError, PayoutErrorKind};
pub use keeper::{
    Bank, EmissionsKeeper, Keeper, NonceStore, ParamsStore, RevenueStore, ScoreStore, Stake,
    TopicStore, REWARDS_ACCOUNT, STAKING_ACCOUNT,
};
pub use params::Params;
pub use rewards::{emit_rewards, process_rewards_at_block};
pub use store::{KvStore, MemStore, StoreError, TxnStore, WriteSet};
pub use types::{
    Address, BlockHeight, NetworkLossBundle, ReputerReport, TaskKind, TaskReward, Topic,
    TopicFeeRevenue, TopicId,
};
