//! Topic weight and the activation gate.
//!
//! A topic's weight is `stake^μ · (fee_revenue / epoch_length)^ν`: monotone
//! in both accumulated revenue and stake, zero when the topic has no epoch
//! progress or either factor is zero. The filter step drops topics that are
//! not reward-ready and inactivates topics below the minimum weight,
//! maintaining the running weight sum used by the splitter.
//!
//! Revenue carry-forward: a topic that stays active but does not win the
//! top-N cut keeps its accumulated revenue untouched. Only winners and
//! inactivated topics get their revenue reset at this block height, and the
//! reset always happens after the block's last revenue read for that topic.

use std::collections::BTreeMap;

use cortex_common::{Dec, Int};

use crate::ctx::BlockCtx;
use crate::error::ChainError;
use crate::keeper::{NonceStore, RevenueStore, TopicStore};
use crate::types::{BlockHeight, Topic, TopicId};

/// Current weight and revenue accumulator of one topic.
pub fn current_topic_weight<K>(
    keeper: &K,
    ctx: &BlockCtx,
    topic: &Topic,
) -> Result<(Dec, Int), ChainError>
where
    K: RevenueStore,
{
    let fee = keeper.topic_fee_revenue(topic.id)?;
    if topic.epoch_length <= 0 {
        return Ok((Dec::zero(), fee.revenue));
    }

    let stake = keeper.topic_stake(topic.id)?;
    if stake.is_zero() || fee.revenue.is_zero() {
        return Ok((Dec::zero(), fee.revenue));
    }

    let fee_per_epoch =
        Dec::from(&fee.revenue).checked_quo(&Dec::from(topic.epoch_length))?;
    let stake_part = Dec::from(&stake).pow(&ctx.params.stake_importance)?;
    let fee_part = fee_per_epoch.pow(&ctx.params.fee_importance)?;
    let weight = stake_part.checked_mul(&fee_part)?;
    Ok((weight, fee.revenue))
}

/// Weights of all active topics, their sum, and the total active revenue.
pub fn current_topic_weights<K>(
    keeper: &K,
    ctx: &BlockCtx,
) -> Result<(BTreeMap<TopicId, Dec>, Dec, Int), ChainError>
where
    K: TopicStore + RevenueStore,
{
    let mut weights = BTreeMap::new();
    let mut sum_weight = Dec::zero();
    let mut total_revenue = Int::zero();
    for topic in keeper.active_topics()? {
        let (weight, revenue) = current_topic_weight(keeper, ctx, &topic)?;
        sum_weight = sum_weight.checked_add(&weight)?;
        total_revenue = total_revenue.checked_add(&revenue)?;
        weights.insert(topic.id, weight);
    }
    Ok((weights, sum_weight, total_revenue))
}

/// Drop non-reward-ready topics and inactivate underweight ones, adjusting
/// the weight sum as topics leave the set.
///
/// Per topic, ascending by id:
/// 1. Missing or zero reward nonce → drop from the set, subtract its weight,
///    carry its revenue forward (no reset).
/// 2. Weight below the minimum → inactivate, reset revenue at this height,
///    drop and subtract. Failure here is fatal.
/// 3. Otherwise keep.
pub fn filter_and_inactivate_topics_updating_sums<K>(
    ctx: &BlockCtx,
    keeper: &mut K,
    weights: &BTreeMap<TopicId, Dec>,
    mut sum_weight: Dec,
    block_height: BlockHeight,
) -> Result<(BTreeMap<TopicId, Dec>, Dec), ChainError>
where
    K: TopicStore + NonceStore + RevenueStore,
{
    let mut active_weights = BTreeMap::new();
    for (&topic_id, weight) in weights {
        let mut filter_out = false;
        match keeper.topic_reward_nonce(topic_id) {
            Ok(0) => {
                ctx.warn(&format!("topic {topic_id} has no reward nonce, skipping"));
                filter_out = true;
            }
            Ok(_) => {}
            Err(err) => {
                ctx.warn(&format!("failed to read reward nonce of topic {topic_id}: {err}"));
                filter_out = true;
            }
        }

        if weight.lt(&ctx.params.min_topic_weight) {
            ctx.warn(&format!("topic {topic_id} weight is below the minimum, inactivating"));
            keeper.inactivate_topic(topic_id)?;
            // Must come after the last revenue read for this topic, otherwise
            // an earlier epoch's revenue would be double counted on the next
            // activation.
            keeper.reset_topic_fee_revenue(topic_id, block_height)?;
            filter_out = true;
        }

        if filter_out {
            sum_weight = sum_weight.checked_sub(weight)?;
        } else {
            active_weights.insert(topic_id, *weight);
        }
    }
    Ok((active_weights, sum_weight))
}
