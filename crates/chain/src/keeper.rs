//! Keeper: the engine's capability record over the keyed store.
//!
//! Rather than one wide interface, the engine consumes narrow traits —
//! [`TopicStore`], [`NonceStore`], [`RevenueStore`], [`ScoreStore`],
//! [`Bank`], [`Stake`], [`ParamsStore`] — aggregated by [`Keeper`], which
//! implements all of them against any [`KvStore`]. Tests run the full engine
//! against `Keeper<MemStore>` or a `Keeper<TxnStore<…>>` with no fakes.
//!
//! ## Key layout (consensus-critical)
//!
//! Numeric key components are big-endian so byte order equals numeric order;
//! every scan below is therefore deterministic and sorted.
//!
//! Layout key bersifat konsensus-kritis dan memerlukan hard-fork untuk
//! perubahan.
//!
//! | Key | Value |
//! |-----|-------|
//! | `tm:<id>`                       | `Topic` |
//! | `tn:<id>`                       | `i64` reward nonce |
//! | `tr:<id>`                       | `TopicFeeRevenue` |
//! | `tu:<id>`                       | `Vec<i64>` unfulfilled reputer nonces |
//! | `tk:<id>`                       | `Int` total topic stake |
//! | `ts:<id>:<kind>:<block>:<actor>`| `Dec` score |
//! | `tl:<id>:<block>`               | `NetworkLossBundle` |
//! | `tb:<id>:<block>`               | `Vec<ReputerReport>` |
//! | `te:<id>:<kind>`                | `Dec` smoothed task entropy |
//! | `sk:<id>:<actor>`               | `Int` per-actor stake |
//! | `bm:<name>` / `ba:<addr>`       | `Int` module / account balance |
//! | `pp` / `pr`                     | `Params` / previous reputer pct |

use std::collections::BTreeMap;

use cortex_common::{Dec, Int};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{BankError, ChainError};
use crate::params::Params;
use crate::store::KvStore;
use crate::types::{
    Address, BlockHeight, NetworkLossBundle, ReputerReport, TaskKind, Topic, TopicFeeRevenue,
    TopicId,
};

/// Module account funded by emission; the source of every payout.
pub const REWARDS_ACCOUNT: &str = "cortex_rewards";

/// Module account holding reputer stake.
pub const STAKING_ACCOUNT: &str = "cortex_staking";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ChainError> {
    bincode::serialize(value).map_err(|e| ChainError::Codec(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ChainError> {
    bincode::deserialize(bytes).map_err(|e| ChainError::Codec(e.to_string()))
}

mod keys {
    use super::*;

    pub const PARAMS: &[u8] = b"pp";
    pub const PREV_REPUTER_PCT: &[u8] = b"pr";

    fn with_id(prefix: &[u8], id: TopicId) -> Vec<u8> {
        let mut key = prefix.to_vec();
        key.extend_from_slice(&id.to_be_bytes());
        key
    }

    fn block_bytes(block: BlockHeight) -> [u8; 8] {
        // Heights of stored records are never negative; the cast keeps the
        // big-endian sort order aligned with numeric order.
        (block as u64).to_be_bytes()
    }

    pub fn topic_meta(id: TopicId) -> Vec<u8> {
        with_id(b"tm:", id)
    }

    pub const TOPIC_META_PREFIX: &[u8] = b"tm:";

    pub fn topic_nonce(id: TopicId) -> Vec<u8> {
        with_id(b"tn:", id)
    }

    pub fn topic_revenue(id: TopicId) -> Vec<u8> {
        with_id(b"tr:", id)
    }

    pub fn topic_unfulfilled(id: TopicId) -> Vec<u8> {
        with_id(b"tu:", id)
    }

    pub fn topic_stake_total(id: TopicId) -> Vec<u8> {
        with_id(b"tk:", id)
    }

    pub fn score(id: TopicId, kind: TaskKind, block: BlockHeight, actor: &str) -> Vec<u8> {
        let mut key = score_prefix(id);
        key.push(kind.key_tag());
        key.push(b':');
        key.extend_from_slice(&block_bytes(block));
        key.push(b':');
        key.extend_from_slice(actor.as_bytes());
        key
    }

    pub fn score_prefix(id: TopicId) -> Vec<u8> {
        let mut key = with_id(b"ts:", id);
        key.push(b':');
        key
    }

    /// Block component of a score key: `ts:` + id(8) + `:` + kind(1) + `:`.
    pub fn score_block_of(key: &[u8]) -> Option<BlockHeight> {
        block_at(key, 3 + 8 + 1 + 1 + 1)
    }

    pub fn loss_bundle(id: TopicId, block: BlockHeight) -> Vec<u8> {
        let mut key = loss_bundle_prefix(id);
        key.extend_from_slice(&block_bytes(block));
        key
    }

    pub fn loss_bundle_prefix(id: TopicId) -> Vec<u8> {
        let mut key = with_id(b"tl:", id);
        key.push(b':');
        key
    }

    pub fn loss_bundle_block_of(key: &[u8]) -> Option<BlockHeight> {
        block_at(key, 3 + 8 + 1)
    }

    pub fn reputer_reports(id: TopicId, block: BlockHeight) -> Vec<u8> {
        let mut key = reputer_reports_prefix(id);
        key.extend_from_slice(&block_bytes(block));
        key
    }

    pub fn reputer_reports_prefix(id: TopicId) -> Vec<u8> {
        let mut key = with_id(b"tb:", id);
        key.push(b':');
        key
    }

    pub fn reputer_reports_block_of(key: &[u8]) -> Option<BlockHeight> {
        block_at(key, 3 + 8 + 1)
    }

    pub fn entropy(id: TopicId, kind: TaskKind) -> Vec<u8> {
        let mut key = with_id(b"te:", id);
        key.push(b':');
        key.push(kind.key_tag());
        key
    }

    pub fn stake(id: TopicId, actor: &str) -> Vec<u8> {
        let mut key = with_id(b"sk:", id);
        key.push(b':');
        key.extend_from_slice(actor.as_bytes());
        key
    }

    pub fn module_balance(name: &str) -> Vec<u8> {
        let mut key = b"bm:".to_vec();
        key.extend_from_slice(name.as_bytes());
        key
    }

    pub fn account_balance(addr: &Address) -> Vec<u8> {
        let mut key = b"ba:".to_vec();
        key.extend_from_slice(addr.as_bytes());
        key
    }

    fn block_at(key: &[u8], offset: usize) -> Option<BlockHeight> {
        let bytes: [u8; 8] = key.get(offset..offset + 8)?.try_into().ok()?;
        Some(u64::from_be_bytes(bytes) as i64)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CAPABILITY TRAITS
// ════════════════════════════════════════════════════════════════════════════

pub trait TopicStore {
    fn topic(&self, id: TopicId) -> Result<Topic, ChainError>;
    fn set_topic(&mut self, topic: &Topic) -> Result<(), ChainError>;
    fn inactivate_topic(&mut self, id: TopicId) -> Result<(), ChainError>;
    /// All active topics, ascending by id.
    fn active_topics(&self) -> Result<Vec<Topic>, ChainError>;
}

pub trait NonceStore {
    /// Block height awaiting settlement; zero when there is none.
    fn topic_reward_nonce(&self, id: TopicId) -> Result<BlockHeight, ChainError>;
    fn set_topic_reward_nonce(&mut self, id: TopicId, nonce: BlockHeight) -> Result<(), ChainError>;
    fn delete_topic_reward_nonce(&mut self, id: TopicId) -> Result<(), ChainError>;
    fn unfulfilled_reputer_nonces(&self, id: TopicId) -> Result<Vec<BlockHeight>, ChainError>;
    fn set_unfulfilled_reputer_nonces(
        &mut self,
        id: TopicId,
        nonces: Vec<BlockHeight>,
    ) -> Result<(), ChainError>;
}

pub trait RevenueStore {
    fn topic_fee_revenue(&self, id: TopicId) -> Result<TopicFeeRevenue, ChainError>;
    fn add_topic_fee_revenue(&mut self, id: TopicId, amount: &Int) -> Result<(), ChainError>;
    /// Zero the accumulator and stamp the reset height. Must be called only
    /// after the last revenue read of the block for this topic.
    fn reset_topic_fee_revenue(&mut self, id: TopicId, block: BlockHeight)
        -> Result<(), ChainError>;
    fn topic_stake(&self, id: TopicId) -> Result<Int, ChainError>;
}

pub trait ScoreStore {
    fn set_score(
        &mut self,
        id: TopicId,
        kind: TaskKind,
        block: BlockHeight,
        actor: &str,
        score: &Dec,
    ) -> Result<(), ChainError>;
    fn scores_at(
        &self,
        id: TopicId,
        kind: TaskKind,
        block: BlockHeight,
    ) -> Result<BTreeMap<String, Dec>, ChainError>;
    fn network_loss_bundle_at(
        &self,
        id: TopicId,
        block: BlockHeight,
    ) -> Result<NetworkLossBundle, ChainError>;
    fn set_network_loss_bundle(&mut self, bundle: &NetworkLossBundle) -> Result<(), ChainError>;
    fn reputer_reports_at(
        &self,
        id: TopicId,
        block: BlockHeight,
    ) -> Result<Vec<ReputerReport>, ChainError>;
    fn set_reputer_reports(
        &mut self,
        id: TopicId,
        block: BlockHeight,
        reports: &[ReputerReport],
    ) -> Result<(), ChainError>;
    fn previous_task_entropy(
        &self,
        id: TopicId,
        kind: TaskKind,
    ) -> Result<Option<Dec>, ChainError>;
    fn set_task_entropy(
        &mut self,
        id: TopicId,
        kind: TaskKind,
        entropy: &Dec,
    ) -> Result<(), ChainError>;
    /// Delete every score, loss bundle and reputer report of the topic with
    /// block height strictly below `cutoff`.
    fn prune_records_after_rewards(
        &mut self,
        id: TopicId,
        cutoff: BlockHeight,
    ) -> Result<(), ChainError>;
}

pub trait Bank {
    fn module_balance(&self, name: &str) -> Result<Int, ChainError>;
    fn account_balance(&self, addr: &Address) -> Result<Int, ChainError>;
    /// Emission faucet: create new tokens in a module account.
    fn mint_to_module(&mut self, name: &str, amount: &Int) -> Result<(), ChainError>;
    fn send_module_to_module(
        &mut self,
        from: &str,
        to: &str,
        amount: &Int,
    ) -> Result<(), ChainError>;
    fn send_module_to_account(
        &mut self,
        from: &str,
        to: &Address,
        amount: &Int,
    ) -> Result<(), ChainError>;

    /// Everything currently sitting in the rewards module account.
    fn total_reward_to_distribute(&self) -> Result<Dec, ChainError> {
        Ok(Dec::from(&self.module_balance(REWARDS_ACCOUNT)?))
    }
}

pub trait Stake {
    /// Credit stake under `(topic, actor)` and the topic's stake total.
    fn add_stake(&mut self, id: TopicId, actor: &str, amount: &Int) -> Result<(), ChainError>;
    fn stake_of(&self, id: TopicId, actor: &str) -> Result<Int, ChainError>;
}

pub trait ParamsStore {
    fn params(&self) -> Result<Params, ChainError>;
    fn set_params(&mut self, params: &Params) -> Result<(), ChainError>;
    fn previous_percentage_reward_to_staked_reputers(&self) -> Result<Dec, ChainError>;
    fn set_previous_percentage_reward_to_staked_reputers(
        &mut self,
        pct: &Dec,
    ) -> Result<(), ChainError>;
}

/// The full capability record the orchestrator needs.
pub trait EmissionsKeeper:
    TopicStore + NonceStore + RevenueStore + ScoreStore + Bank + Stake + ParamsStore
{
}

impl<T> EmissionsKeeper for T where
    T: TopicStore + NonceStore + RevenueStore + ScoreStore + Bank + Stake + ParamsStore
{
}

// ════════════════════════════════════════════════════════════════════════════
// KEEPER
// ════════════════════════════════════════════════════════════════════════════

/// Implements every capability trait against one keyed store.
pub struct Keeper<S: KvStore> {
    store: S,
}

impl<S: KvStore> Keeper<S> {
    pub fn new(store: S) -> Self {
        Keeper { store }
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn get_decoded<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, ChainError> {
        match self.store.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn set_encoded<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<(), ChainError> {
        let bytes = encode(value)?;
        self.store.set(key, bytes)?;
        Ok(())
    }

    fn balance_at(&self, key: &[u8]) -> Result<Int, ChainError> {
        Ok(self.get_decoded::<Int>(key)?.unwrap_or_default())
    }

    fn credit(&mut self, key: Vec<u8>, account: &str, amount: &Int) -> Result<(), ChainError> {
        let balance = self.balance_at(&key)?;
        let updated = balance
            .checked_add(amount)
            .map_err(|_| BankError::BalanceOverflow { account: account.to_string() })?;
        self.set_encoded(key, &updated)
    }

    fn debit(&mut self, key: Vec<u8>, account: &str, amount: &Int) -> Result<(), ChainError> {
        // Saldo tidak boleh minus; transfer yang gagal tidak memutasi state.
        let balance = self.balance_at(&key)?;
        if balance < *amount {
            return Err(BankError::InsufficientFunds {
                account: account.to_string(),
                available: balance,
                needed: *amount,
            }
            .into());
        }
        let updated = balance
            .checked_sub(amount)
            .map_err(|_| BankError::BalanceOverflow { account: account.to_string() })?;
        self.set_encoded(key, &updated)
    }

    fn prune_prefix(
        &mut self,
        prefix: Vec<u8>,
        cutoff: BlockHeight,
        block_of: fn(&[u8]) -> Option<BlockHeight>,
    ) -> Result<(), ChainError> {
        let entries = self.store.iter_prefix(&prefix)?;
        for (key, _) in entries {
            match block_of(&key) {
                Some(block) if block < cutoff => self.store.delete(&key)?,
                Some(_) => {}
                None => {
                    return Err(ChainError::Codec(format!(
                        "unparseable record key {}",
                        hex::encode(&key)
                    )))
                }
            }
        }
        Ok(())
    }
}

impl<S: KvStore> TopicStore for Keeper<S> {
    fn topic(&self, id: TopicId) -> Result<Topic, ChainError> {
        self.get_decoded(&keys::topic_meta(id))?
            .ok_or(ChainError::UnknownTopic(id))
    }

    fn set_topic(&mut self, topic: &Topic) -> Result<(), ChainError> {
        self.set_encoded(keys::topic_meta(topic.id), topic)
    }

    fn inactivate_topic(&mut self, id: TopicId) -> Result<(), ChainError> {
        let mut topic = self.topic(id)?;
        topic.active = false;
        self.set_topic(&topic)
    }

    fn active_topics(&self) -> Result<Vec<Topic>, ChainError> {
        let mut topics = Vec::new();
        for (_, bytes) in self.store.iter_prefix(keys::TOPIC_META_PREFIX)? {
            let topic: Topic = decode(&bytes)?;
            if topic.active {
                topics.push(topic);
            }
        }
        Ok(topics)
    }
}

impl<S: KvStore> NonceStore for Keeper<S> {
    fn topic_reward_nonce(&self, id: TopicId) -> Result<BlockHeight, ChainError> {
        Ok(self.get_decoded(&keys::topic_nonce(id))?.unwrap_or(0))
    }

    fn set_topic_reward_nonce(&mut self, id: TopicId, nonce: BlockHeight) -> Result<(), ChainError> {
        self.set_encoded(keys::topic_nonce(id), &nonce)
    }

    fn delete_topic_reward_nonce(&mut self, id: TopicId) -> Result<(), ChainError> {
        self.store.delete(&keys::topic_nonce(id))?;
        Ok(())
    }

    fn unfulfilled_reputer_nonces(&self, id: TopicId) -> Result<Vec<BlockHeight>, ChainError> {
        Ok(self.get_decoded(&keys::topic_unfulfilled(id))?.unwrap_or_default())
    }

    fn set_unfulfilled_reputer_nonces(
        &mut self,
        id: TopicId,
        mut nonces: Vec<BlockHeight>,
    ) -> Result<(), ChainError> {
        nonces.sort_unstable();
        self.set_encoded(keys::topic_unfulfilled(id), &nonces)
    }
}

impl<S: KvStore> RevenueStore for Keeper<S> {
    fn topic_fee_revenue(&self, id: TopicId) -> Result<TopicFeeRevenue, ChainError> {
        Ok(self.get_decoded(&keys::topic_revenue(id))?.unwrap_or_default())
    }

    fn add_topic_fee_revenue(&mut self, id: TopicId, amount: &Int) -> Result<(), ChainError> {
        let mut fee = self.topic_fee_revenue(id)?;
        fee.revenue = fee.revenue.checked_add(amount)?;
        self.set_encoded(keys::topic_revenue(id), &fee)
    }

    fn reset_topic_fee_revenue(
        &mut self,
        id: TopicId,
        block: BlockHeight,
    ) -> Result<(), ChainError> {
        let fee = TopicFeeRevenue { revenue: Int::zero(), epoch: block };
        self.set_encoded(keys::topic_revenue(id), &fee)
    }

    fn topic_stake(&self, id: TopicId) -> Result<Int, ChainError> {
        Ok(self.get_decoded(&keys::topic_stake_total(id))?.unwrap_or_default())
    }
}

impl<S: KvStore> ScoreStore for Keeper<S> {
    fn set_score(
        &mut self,
        id: TopicId,
        kind: TaskKind,
        block: BlockHeight,
        actor: &str,
        score: &Dec,
    ) -> Result<(), ChainError> {
        self.set_encoded(keys::score(id, kind, block, actor), score)
    }

    fn scores_at(
        &self,
        id: TopicId,
        kind: TaskKind,
        block: BlockHeight,
    ) -> Result<BTreeMap<String, Dec>, ChainError> {
        let mut prefix = keys::score_prefix(id);
        prefix.push(kind.key_tag());
        prefix.push(b':');
        prefix.extend_from_slice(&(block as u64).to_be_bytes());
        prefix.push(b':');
        let mut scores = BTreeMap::new();
        for (key, bytes) in self.store.iter_prefix(&prefix)? {
            let actor = String::from_utf8(key[prefix.len()..].to_vec())
                .map_err(|e| ChainError::Codec(format!("bad actor key: {e}")))?;
            scores.insert(actor, decode(&bytes)?);
        }
        Ok(scores)
    }

    fn network_loss_bundle_at(
        &self,
        id: TopicId,
        block: BlockHeight,
    ) -> Result<NetworkLossBundle, ChainError> {
        self.get_decoded(&keys::loss_bundle(id, block))?
            .ok_or_else(|| {
                ChainError::MissingRecord(format!("network loss bundle for topic {id} at {block}"))
            })
    }

    fn set_network_loss_bundle(&mut self, bundle: &NetworkLossBundle) -> Result<(), ChainError> {
        self.set_encoded(keys::loss_bundle(bundle.topic_id, bundle.block_height), bundle)
    }

    fn reputer_reports_at(
        &self,
        id: TopicId,
        block: BlockHeight,
    ) -> Result<Vec<ReputerReport>, ChainError> {
        self.get_decoded(&keys::reputer_reports(id, block))?
            .ok_or_else(|| {
                ChainError::MissingRecord(format!("reputer reports for topic {id} at {block}"))
            })
    }

    fn set_reputer_reports(
        &mut self,
        id: TopicId,
        block: BlockHeight,
        reports: &[ReputerReport],
    ) -> Result<(), ChainError> {
        let mut sorted = reports.to_vec();
        sorted.sort_by(|a, b| a.reputer.cmp(&b.reputer));
        self.set_encoded(keys::reputer_reports(id, block), &sorted)
    }

    fn previous_task_entropy(
        &self,
        id: TopicId,
        kind: TaskKind,
    ) -> Result<Option<Dec>, ChainError> {
        self.get_decoded(&keys::entropy(id, kind))
    }

    fn set_task_entropy(
        &mut self,
        id: TopicId,
        kind: TaskKind,
        entropy: &Dec,
    ) -> Result<(), ChainError> {
        self.set_encoded(keys::entropy(id, kind), entropy)
    }

    fn prune_records_after_rewards(
        &mut self,
        id: TopicId,
        cutoff: BlockHeight,
    ) -> Result<(), ChainError> {
        self.prune_prefix(keys::score_prefix(id), cutoff, keys::score_block_of)?;
        self.prune_prefix(keys::loss_bundle_prefix(id), cutoff, keys::loss_bundle_block_of)?;
        self.prune_prefix(
            keys::reputer_reports_prefix(id),
            cutoff,
            keys::reputer_reports_block_of,
        )
    }
}

impl<S: KvStore> Bank for Keeper<S> {
    fn module_balance(&self, name: &str) -> Result<Int, ChainError> {
        self.balance_at(&keys::module_balance(name))
    }

    fn account_balance(&self, addr: &Address) -> Result<Int, ChainError> {
        self.balance_at(&keys::account_balance(addr))
    }

    fn mint_to_module(&mut self, name: &str, amount: &Int) -> Result<(), ChainError> {
        if amount.is_negative() {
            return Err(BankError::NegativeAmount { amount: *amount }.into());
        }
        self.credit(keys::module_balance(name), name, amount)
    }

    fn send_module_to_module(
        &mut self,
        from: &str,
        to: &str,
        amount: &Int,
    ) -> Result<(), ChainError> {
        if amount.is_negative() {
            return Err(BankError::NegativeAmount { amount: *amount }.into());
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.debit(keys::module_balance(from), from, amount)?;
        self.credit(keys::module_balance(to), to, amount)
    }

    fn send_module_to_account(
        &mut self,
        from: &str,
        to: &Address,
        amount: &Int,
    ) -> Result<(), ChainError> {
        if amount.is_negative() {
            return Err(BankError::NegativeAmount { amount: *amount }.into());
        }
        if amount.is_zero() {
            return Ok(());
        }
        self.debit(keys::module_balance(from), from, amount)?;
        self.credit(keys::account_balance(to), &to.to_string(), amount)
    }
}

impl<S: KvStore> Stake for Keeper<S> {
    fn add_stake(&mut self, id: TopicId, actor: &str, amount: &Int) -> Result<(), ChainError> {
        if amount.is_negative() {
            return Err(BankError::NegativeAmount { amount: *amount }.into());
        }
        let stake_key = keys::stake(id, actor);
        let current = self.balance_at(&stake_key)?;
        let updated = current.checked_add(amount)?;
        self.set_encoded(stake_key, &updated)?;

        let total_key = keys::topic_stake_total(id);
        let total = self.balance_at(&total_key)?;
        let updated_total = total.checked_add(amount)?;
        self.set_encoded(total_key, &updated_total)
    }

    fn stake_of(&self, id: TopicId, actor: &str) -> Result<Int, ChainError> {
        self.balance_at(&keys::stake(id, actor))
    }
}

impl<S: KvStore> ParamsStore for Keeper<S> {
    fn params(&self) -> Result<Params, ChainError> {
        Ok(self.get_decoded(keys::PARAMS)?.unwrap_or_default())
    }

    fn set_params(&mut self, params: &Params) -> Result<(), ChainError> {
        params
            .validate()
            .map_err(|e| ChainError::Codec(format!("rejected params: {e}")))?;
        self.set_encoded(keys::PARAMS.to_vec(), params)
    }

    fn previous_percentage_reward_to_staked_reputers(&self) -> Result<Dec, ChainError> {
        Ok(self.get_decoded(keys::PREV_REPUTER_PCT)?.unwrap_or_else(Dec::zero))
    }

    fn set_previous_percentage_reward_to_staked_reputers(
        &mut self,
        pct: &Dec,
    ) -> Result<(), ChainError> {
        self.set_encoded(keys::PREV_REPUTER_PCT.to_vec(), pct)
    }
}
