//! Per-block reward distribution driver.
//!
//! ## Block sequence
//!
//! 1. Read the total reward to distribute; zero → log and return.
//! 2. Filter and inactivate topics, maintaining the weight sum.
//! 3. Skim the top-N winners by weight.
//! 4. Reset the revenue of winners only; bottom topics carry theirs forward.
//! 5. `reward(t) = total · weight(t) / top_weight` per winner.
//! 6. Per winner ascending by id: scores → fractions → entropies → task
//!    split → payout → prune. Per-topic failures are logged and skipped;
//!    payout errors suppress only that topic's pruning.
//! 7. On the monthly boundary, snapshot the fraction paid to staked
//!    reputers.
//!
//! ## Failure semantics
//!
//! A [`ChainError`] out of [`emit_rewards`] is fatal: the caller's store
//! transaction is dropped and no write of the block survives.
//! [`process_rewards_at_block`] is that caller — it owns the transaction and
//! guarantees commit-or-rollback on every exit path.

use std::collections::BTreeMap;

use cortex_common::{Dec, Int};

use crate::ctx::BlockCtx;
use crate::error::ChainError;
use crate::keeper::{EmissionsKeeper, Keeper, ParamsStore};
use crate::payout::payout_rewards;
use crate::prune::prune_records_after_rewards;
use crate::skim::skim_top_topics_by_weight_desc;
use crate::split::generate_topic_participant_rewards;
use crate::store::{MemStore, TxnStore};
use crate::topics::{current_topic_weights, filter_and_inactivate_topics_updating_sums};
use crate::types::{BlockHeight, TopicId};

/// Process one block's reward distribution against the base store, inside a
/// transaction: commit on success, discard every write on a fatal error.
pub fn process_rewards_at_block(
    store: &mut MemStore,
    block_height: BlockHeight,
) -> Result<(), ChainError> {
    let txn = TxnStore::new(&*store);
    let mut keeper = Keeper::new(txn);
    let params = keeper.params()?;
    let ctx = BlockCtx::new(block_height, params);

    let (weights, sum_weight, total_revenue) = current_topic_weights(&keeper, &ctx)?;
    emit_rewards(&ctx, &mut keeper, &weights, sum_weight, total_revenue)?;

    let writes = keeper.into_store().into_writes();
    store.apply(writes);
    Ok(())
}

/// The block driver over an already-open transaction.
pub fn emit_rewards<K: EmissionsKeeper>(
    ctx: &BlockCtx,
    keeper: &mut K,
    weights: &BTreeMap<TopicId, Dec>,
    sum_weight: Dec,
    total_revenue: Int,
) -> Result<(), ChainError> {
    let total_reward = keeper.total_reward_to_distribute()?;
    ctx.debug(&format!(
        "reward to distribute this block: {total_reward}, active revenue {total_revenue}"
    ));
    if total_reward.is_zero() {
        ctx.warn("total scheduled rewards to distribute this block are zero");
        return Ok(());
    }

    let topic_rewards = match generate_rewards_distribution_by_topic(
        ctx,
        keeper,
        ctx.params.max_topics_per_block,
        &total_reward,
        weights,
        sum_weight,
    )? {
        Some(rewards) => rewards,
        None => return Ok(()),
    };

    let mut total_reward_to_staked_reputers = Dec::zero();
    for (&topic_id, topic_reward) in &topic_rewards {
        // The winner must still be settlement-ready.
        let topic_reward_nonce = match keeper.topic_reward_nonce(topic_id) {
            Ok(0) | Err(_) => continue,
            Ok(nonce) => nonce,
        };

        let (distribution, reward_to_reputers) = match generate_topic_participant_rewards(
            ctx,
            keeper,
            topic_id,
            topic_reward,
            topic_reward_nonce,
        ) {
            Ok(result) => result,
            Err(err) => {
                ctx.warn(&format!(
                    "failed to generate rewards for topic {topic_id} (reward {topic_reward}), skipping: {err}"
                ));
                continue;
            }
        };
        total_reward_to_staked_reputers =
            total_reward_to_staked_reputers.checked_add(&reward_to_reputers)?;

        let payout_errors = payout_rewards(ctx, keeper, &distribution)?;
        if !payout_errors.is_empty() {
            for err in &payout_errors {
                ctx.warn(&format!("failed to pay out in topic {topic_id}: {err}"));
            }
            // Records stay; the bundle can be settled by a later audit path.
            continue;
        }

        if let Err(err) = prune_records_after_rewards(
            ctx,
            keeper,
            ctx.params.min_epoch_length_record_limit,
            topic_id,
            topic_reward_nonce,
        ) {
            ctx.warn(&format!("failed to prune records of topic {topic_id}, skipping: {err}"));
            continue;
        }
    }

    ctx.debug(&format!(
        "paid {total_reward_to_staked_reputers} to staked reputers over {} topics",
        topic_rewards.len()
    ));

    if !total_reward.is_zero()
        && (ctx.block_height as u64) % ctx.params.blocks_per_month == 0
    {
        // The mint side reads this to steer inflation toward reputers.
        let pct = total_reward_to_staked_reputers.checked_quo(&total_reward)?;
        keeper.set_previous_percentage_reward_to_staked_reputers(&pct)?;
    }

    Ok(())
}

/// Split the block's total reward across the winning topics.
///
/// Returns `None` when there is nothing to pay: no weights survive the
/// filter, or none existed to begin with.
pub fn generate_rewards_distribution_by_topic<K: EmissionsKeeper>(
    ctx: &BlockCtx,
    keeper: &mut K,
    max_topics_per_block: u64,
    total_reward: &Dec,
    weights: &BTreeMap<TopicId, Dec>,
    sum_weight: Dec,
) -> Result<Option<BTreeMap<TopicId, Dec>>, ChainError> {
    if sum_weight.is_zero() {
        ctx.warn("no topic weights, no rewards");
        return Ok(None);
    }

    let (active_weights, sum_weight) = filter_and_inactivate_topics_updating_sums(
        ctx,
        keeper,
        weights,
        sum_weight,
        ctx.block_height,
    )?;
    if sum_weight.is_zero() {
        ctx.warn("no filtered topic weights, no rewards");
        return Ok(None);
    }

    let top_weights =
        skim_top_topics_by_weight_desc(&active_weights, max_topics_per_block, ctx.block_height);

    // Bottom topics keep their revenue for future cuts; only winners get
    // reset, and only after their last revenue read of the block.
    let mut sum_revenue_of_bottom_topics = Int::zero();
    let mut sum_weight_of_bottom_topics = Dec::zero();
    for (&topic_id, weight) in weights {
        if !active_weights.contains_key(&topic_id) {
            continue;
        }
        if top_weights.contains_key(&topic_id) {
            keeper.reset_topic_fee_revenue(topic_id, ctx.block_height)?;
        } else {
            let fee = keeper.topic_fee_revenue(topic_id)?;
            sum_revenue_of_bottom_topics = sum_revenue_of_bottom_topics.checked_add(&fee.revenue)?;
            sum_weight_of_bottom_topics = sum_weight_of_bottom_topics.checked_add(weight)?;
        }
    }
    ctx.debug(&format!(
        "revenue {sum_revenue_of_bottom_topics} carried forward by topics below the cut"
    ));

    let weight_of_top_topics = sum_weight.checked_sub(&sum_weight_of_bottom_topics)?;
    let topic_rewards = calc_topic_rewards(&top_weights, &weight_of_top_topics, total_reward)?;
    Ok(Some(topic_rewards))
}

fn calc_topic_rewards(
    weights: &BTreeMap<TopicId, Dec>,
    sum_weight: &Dec,
    total_reward: &Dec,
) -> Result<BTreeMap<TopicId, Dec>, ChainError> {
    let mut topic_rewards = BTreeMap::new();
    for (&topic_id, weight) in weights {
        let fraction = weight.checked_quo(sum_weight)?;
        let reward = total_reward.checked_mul(&fraction)?;
        topic_rewards.insert(topic_id, reward);
    }
    Ok(topic_rewards)
}
