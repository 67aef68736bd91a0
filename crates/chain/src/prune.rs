//! Record pruning after a successful payout.
//!
//! Records must outlive every unfulfilled reputer nonce plus a safety margin
//! of `min_epoch_length_record_limit` epochs, so the cutoff is derived from
//! the oldest unfulfilled nonce — or from the nonce just paid when none are
//! pending — never from the current height.

use crate::ctx::BlockCtx;
use crate::error::ChainError;
use crate::keeper::{NonceStore, ScoreStore, TopicStore};
use crate::types::{BlockHeight, TopicId};
use cortex_common::MathError;

pub fn prune_records_after_rewards<K>(
    ctx: &BlockCtx,
    keeper: &mut K,
    min_epoch_length_record_limit: i64,
    topic_id: TopicId,
    topic_reward_nonce: BlockHeight,
) -> Result<(), ChainError>
where
    K: TopicStore + NonceStore + ScoreStore,
{
    keeper.delete_topic_reward_nonce(topic_id)?;

    let unfulfilled = keeper.unfulfilled_reputer_nonces(topic_id)?;
    let oldest = unfulfilled
        .iter()
        .copied()
        .min()
        .unwrap_or(topic_reward_nonce);

    let topic = keeper.topic(topic_id)?;
    let margin = min_epoch_length_record_limit
        .checked_mul(topic.epoch_length)
        .ok_or(MathError::Overflow)?;
    let cutoff = oldest.checked_sub(margin).ok_or(MathError::Overflow)?;

    ctx.debug(&format!("pruning topic {topic_id} records below height {cutoff}"));
    keeper.prune_records_after_rewards(topic_id, cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::Keeper;
    use crate::params::Params;
    use crate::store::MemStore;
    use crate::types::{TaskKind, Topic};
    use cortex_common::Dec;

    fn ctx() -> BlockCtx {
        BlockCtx::new(1000, Params::default())
    }

    fn seeded(epoch_length: i64) -> Keeper<MemStore> {
        let mut k = Keeper::new(MemStore::new());
        k.set_topic(&Topic { id: 1, epoch_length, ground_truth_lag: 10, active: true }).unwrap();
        k.set_topic_reward_nonce(1, 1000).unwrap();
        let score = Dec::from(1u64);
        for block in [600, 699, 700, 1000] {
            k.set_score(1, TaskKind::Reputer, block, "0xaa", &score).unwrap();
        }
        k
    }

    #[test]
    fn test_cutoff_from_oldest_unfulfilled_nonce() {
        // oldest 1000, margin 3 × 100 → cutoff 700: 699 goes, 700 stays.
        let mut k = seeded(100);
        k.set_unfulfilled_reputer_nonces(1, vec![1200, 1000]).unwrap();
        prune_records_after_rewards(&ctx(), &mut k, 3, 1, 1000).unwrap();

        assert_eq!(k.topic_reward_nonce(1).unwrap(), 0);
        assert!(k.scores_at(1, TaskKind::Reputer, 699).unwrap().is_empty());
        assert!(!k.scores_at(1, TaskKind::Reputer, 700).unwrap().is_empty());
        assert!(!k.scores_at(1, TaskKind::Reputer, 1000).unwrap().is_empty());
    }

    #[test]
    fn test_cutoff_defaults_to_paid_nonce() {
        // No unfulfilled nonces: the nonce just paid bounds the cutoff.
        let mut k = seeded(100);
        prune_records_after_rewards(&ctx(), &mut k, 3, 1, 1000).unwrap();
        assert!(k.scores_at(1, TaskKind::Reputer, 699).unwrap().is_empty());
        assert!(!k.scores_at(1, TaskKind::Reputer, 700).unwrap().is_empty());
    }

    #[test]
    fn test_older_pending_nonce_blocks_pruning() {
        // An unfulfilled nonce at 900 pulls the cutoff down to 600.
        let mut k = seeded(100);
        k.set_unfulfilled_reputer_nonces(1, vec![900]).unwrap();
        prune_records_after_rewards(&ctx(), &mut k, 3, 1, 1000).unwrap();
        assert!(!k.scores_at(1, TaskKind::Reputer, 600).unwrap().is_empty());
        assert!(!k.scores_at(1, TaskKind::Reputer, 699).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_topic_is_an_error() {
        let mut k = Keeper::new(MemStore::new());
        k.set_topic_reward_nonce(9, 1000).unwrap();
        assert_eq!(
            prune_records_after_rewards(&ctx(), &mut k, 3, 9, 1000),
            Err(ChainError::UnknownTopic(9))
        );
    }
}
