//! Task splitter.
//!
//! Partitions a topic's reward across the reputer, inference and forecast
//! tasks by their smoothed entropies, then fans each task's share out to its
//! actors by reward fraction.
//!
//! The forecasting utility `χ = clamp(combined/naive, 0, 1)` shifts reward
//! between the worker tasks: the inference task earns `(1−χ)` of its
//! entropy-weighted share and the forecast task earns `χ` of its own. When
//! the forecast task carries no entropy its share collapses into inference.
//! A zero entropy total makes every task reward zero; the topic silently
//! contributes nothing this block, which is a logged condition and not an
//! error.

use cortex_common::Dec;

use crate::ctx::BlockCtx;
use crate::error::ChainError;
use crate::fractions;
use crate::keeper::ScoreStore;
use crate::scores;
use crate::types::{BlockHeight, TaskKind, TaskReward, TopicId};

/// `χ = clamp(combined/naive, 0, 1)`; zero when there is no usable baseline.
pub fn forecasting_utility(naive: &Dec, combined: &Dec) -> Result<Dec, ChainError> {
    if naive.is_zero() {
        return Ok(Dec::zero());
    }
    let ratio = combined.checked_quo(naive)?;
    if ratio.is_negative() {
        return Ok(Dec::zero());
    }
    let one = Dec::one();
    if one.lt(&ratio) {
        return Ok(one);
    }
    Ok(ratio)
}

fn entropy_total(
    inference_entropy: &Dec,
    forecasting_entropy: &Dec,
    reputer_entropy: &Dec,
) -> Result<Dec, ChainError> {
    Ok(inference_entropy
        .checked_add(forecasting_entropy)?
        .checked_add(reputer_entropy)?)
}

/// Reputer task share `R · H_rep / (H_inf + H_fore + H_rep)`.
pub fn reward_for_reputer_task(
    inference_entropy: &Dec,
    forecasting_entropy: &Dec,
    reputer_entropy: &Dec,
    topic_reward: &Dec,
) -> Result<Dec, ChainError> {
    let total = entropy_total(inference_entropy, forecasting_entropy, reputer_entropy)?;
    if total.is_zero() {
        return Ok(Dec::zero());
    }
    Ok(topic_reward.checked_mul(reputer_entropy)?.checked_quo(&total)?)
}

/// Inference task share; absorbs the forecast share when the forecast task
/// carries no entropy.
pub fn reward_for_inference_task(
    naive: &Dec,
    combined: &Dec,
    inference_entropy: &Dec,
    forecasting_entropy: &Dec,
    reputer_entropy: &Dec,
    topic_reward: &Dec,
) -> Result<Dec, ChainError> {
    let total = entropy_total(inference_entropy, forecasting_entropy, reputer_entropy)?;
    if total.is_zero() {
        return Ok(Dec::zero());
    }
    let base = topic_reward.checked_mul(inference_entropy)?.checked_quo(&total)?;
    if forecasting_entropy.is_zero() {
        return Ok(base);
    }
    let chi = forecasting_utility(naive, combined)?;
    base.checked_mul(&Dec::one().checked_sub(&chi)?)
        .map_err(ChainError::from)
}

/// Forecast task share; zero whenever the forecast task carries no entropy.
pub fn reward_for_forecasting_task(
    naive: &Dec,
    combined: &Dec,
    inference_entropy: &Dec,
    forecasting_entropy: &Dec,
    reputer_entropy: &Dec,
    topic_reward: &Dec,
) -> Result<Dec, ChainError> {
    let total = entropy_total(inference_entropy, forecasting_entropy, reputer_entropy)?;
    if total.is_zero() || forecasting_entropy.is_zero() {
        return Ok(Dec::zero());
    }
    let chi = forecasting_utility(naive, combined)?;
    topic_reward
        .checked_mul(forecasting_entropy)?
        .checked_quo(&total)?
        .checked_mul(&chi)
        .map_err(ChainError::from)
}

/// Fan one task's reward out by fraction, in the fraction list's order.
pub fn rewards_per_actor(
    topic_id: TopicId,
    kind: TaskKind,
    task_reward: &Dec,
    fractions: &[(String, Dec)],
) -> Result<Vec<TaskReward>, ChainError> {
    fractions
        .iter()
        .map(|(actor, fraction)| {
            Ok(TaskReward {
                topic_id,
                address: actor.clone(),
                amount: task_reward.checked_mul(fraction)?,
                kind,
            })
        })
        .collect()
}

fn fraction_values(fractions: &[(String, Dec)]) -> Vec<Dec> {
    fractions.iter().map(|(_, f)| f).copied().collect()
}

/// The full per-topic settlement pipeline: scores → fractions → entropies →
/// task split → flat payout list (reputers, then inferers, then forecasters,
/// each ascending by actor).
///
/// Returns the list and the reputer task total, which the orchestrator
/// accumulates for the monthly staked-reputer percentage.
pub fn generate_topic_participant_rewards<K: ScoreStore>(
    ctx: &BlockCtx,
    keeper: &mut K,
    topic_id: TopicId,
    topic_reward: &Dec,
    block_height: BlockHeight,
) -> Result<(Vec<TaskReward>, Dec), ChainError> {
    if topic_reward.is_negative() {
        return Err(ChainError::InvalidReward(topic_id));
    }

    let reports = keeper.reputer_reports_at(topic_id, block_height)?;
    let bundle = keeper.network_loss_bundle_at(topic_id, block_height)?;

    let reputer_scores =
        scores::generate_reputer_scores(keeper, topic_id, block_height, &reports, &bundle)?;
    let inferer_scores =
        scores::generate_inference_scores(keeper, topic_id, block_height, &bundle)?;
    let forecaster_scores =
        scores::generate_forecast_scores(keeper, topic_id, block_height, &bundle)?;

    let params = &ctx.params;
    let reputer_fractions =
        fractions::reward_fractions(&params.p_reward_reputer, &Dec::zero(), &reputer_scores)?;
    let reputer_entropy = fractions::task_entropy(
        keeper,
        topic_id,
        TaskKind::Reputer,
        &params.task_reward_alpha,
        &params.beta_entropy,
        &fraction_values(&reputer_fractions),
    )?;

    let inferer_fractions = fractions::reward_fractions(
        &params.p_reward_inference,
        &params.c_reward_inference,
        &inferer_scores,
    )?;
    let inference_entropy = fractions::task_entropy(
        keeper,
        topic_id,
        TaskKind::WorkerInference,
        &params.task_reward_alpha,
        &params.beta_entropy,
        &fraction_values(&inferer_fractions),
    )?;

    let forecaster_fractions = fractions::reward_fractions(
        &params.p_reward_forecast,
        &params.c_reward_forecast,
        &forecaster_scores,
    )?;
    // The forecast task needs someone to forecast and at least two inferers
    // for a forecast-implied inference to be distinguishable.
    let forecasting_entropy = if !forecaster_scores.is_empty() && inferer_scores.len() > 1 {
        fractions::task_entropy(
            keeper,
            topic_id,
            TaskKind::WorkerForecast,
            &params.task_reward_alpha,
            &params.beta_entropy,
            &fraction_values(&forecaster_fractions),
        )?
    } else {
        Dec::zero()
    };

    let total = entropy_total(&inference_entropy, &forecasting_entropy, &reputer_entropy)?;
    if total.is_zero() {
        ctx.warn(&format!("topic {topic_id} has zero total task entropy, paying nothing"));
    }

    let task_reputer_reward = reward_for_reputer_task(
        &inference_entropy,
        &forecasting_entropy,
        &reputer_entropy,
        topic_reward,
    )?;
    let task_inference_reward = reward_for_inference_task(
        &bundle.naive_value,
        &bundle.combined_value,
        &inference_entropy,
        &forecasting_entropy,
        &reputer_entropy,
        topic_reward,
    )?;
    let task_forecasting_reward = reward_for_forecasting_task(
        &bundle.naive_value,
        &bundle.combined_value,
        &inference_entropy,
        &forecasting_entropy,
        &reputer_entropy,
        topic_reward,
    )?;

    let mut distribution = rewards_per_actor(
        topic_id,
        TaskKind::Reputer,
        &task_reputer_reward,
        &reputer_fractions,
    )?;
    distribution.extend(rewards_per_actor(
        topic_id,
        TaskKind::WorkerInference,
        &task_inference_reward,
        &inferer_fractions,
    )?);
    distribution.extend(rewards_per_actor(
        topic_id,
        TaskKind::WorkerForecast,
        &task_forecasting_reward,
        &forecaster_fractions,
    )?);

    Ok((distribution, task_reputer_reward))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::Keeper;
    use crate::params::Params;
    use crate::store::MemStore;
    use crate::types::{NetworkLossBundle, ReputerReport};
    use std::collections::BTreeMap;
    use std::str::FromStr;

    fn dec(s: &str) -> Dec {
        Dec::from_str(s).unwrap()
    }

    #[test]
    fn test_chi_clamps_into_unit_interval() {
        assert_eq!(forecasting_utility(&dec("2"), &dec("1")).unwrap(), dec("0.5"));
        assert_eq!(forecasting_utility(&dec("1"), &dec("3")).unwrap(), Dec::one());
        assert_eq!(forecasting_utility(&dec("0"), &dec("3")).unwrap(), Dec::zero());
        assert_eq!(forecasting_utility(&dec("1"), &dec("-1")).unwrap(), Dec::zero());
    }

    #[test]
    fn test_task_split_shares_follow_entropies() {
        let h_inf = dec("0.2");
        let h_fore = dec("0.1");
        let h_rep = dec("0.2");
        let reward = dec("500");
        let naive = dec("2");
        let combined = dec("1"); // χ = 0.5

        let rep = reward_for_reputer_task(&h_inf, &h_fore, &h_rep, &reward).unwrap();
        let inf =
            reward_for_inference_task(&naive, &combined, &h_inf, &h_fore, &h_rep, &reward).unwrap();
        let fore = reward_for_forecasting_task(&naive, &combined, &h_inf, &h_fore, &h_rep, &reward)
            .unwrap();

        assert_eq!(rep, dec("200")); // 500 · 0.2/0.5
        assert_eq!(inf, dec("100")); // 500 · 0.2/0.5 · (1−0.5)
        assert_eq!(fore, dec("50")); // 500 · 0.1/0.5 · 0.5
        // χ shifting never pushes the split above the topic reward.
        let total = rep.checked_add(&inf).unwrap().checked_add(&fore).unwrap();
        assert!(total <= reward);
    }

    #[test]
    fn test_forecast_share_collapses_into_inference() {
        let h_inf = dec("0.3");
        let h_rep = dec("0.3");
        let zero = Dec::zero();
        let reward = dec("600");

        let inf = reward_for_inference_task(&dec("2"), &dec("1"), &h_inf, &zero, &h_rep, &reward)
            .unwrap();
        let fore =
            reward_for_forecasting_task(&dec("2"), &dec("1"), &h_inf, &zero, &h_rep, &reward)
                .unwrap();
        // No χ discount once forecasting is out of the picture.
        assert_eq!(inf, dec("300"));
        assert!(fore.is_zero());
    }

    #[test]
    fn test_zero_entropy_total_pays_nothing() {
        let zero = Dec::zero();
        let reward = dec("400");
        assert!(reward_for_reputer_task(&zero, &zero, &zero, &reward).unwrap().is_zero());
        assert!(
            reward_for_inference_task(&dec("1"), &dec("1"), &zero, &zero, &zero, &reward)
                .unwrap()
                .is_zero()
        );
        assert!(
            reward_for_forecasting_task(&dec("1"), &dec("1"), &zero, &zero, &zero, &reward)
                .unwrap()
                .is_zero()
        );
    }

    fn seeded_keeper(with_forecasters: bool) -> (Keeper<MemStore>, BlockCtx) {
        let mut k = Keeper::new(MemStore::new());
        let mut inferer_losses = BTreeMap::new();
        inferer_losses.insert("0xa1".to_string(), dec("0.5"));
        inferer_losses.insert("0xa2".to_string(), dec("0.8"));
        let mut forecaster_losses = BTreeMap::new();
        if with_forecasters {
            forecaster_losses.insert("0xb1".to_string(), dec("0.6"));
        }
        k.set_network_loss_bundle(&NetworkLossBundle {
            topic_id: 1,
            block_height: 100,
            naive_value: dec("1"),
            combined_value: dec("0.4"),
            inferer_losses,
            forecaster_losses,
        })
        .unwrap();
        k.set_reputer_reports(
            1,
            100,
            &[
                ReputerReport {
                    reputer: "0xr1".to_string(),
                    naive_value: dec("1"),
                    combined_value: dec("0.4"),
                },
                ReputerReport {
                    reputer: "0xr2".to_string(),
                    naive_value: dec("1.1"),
                    combined_value: dec("0.5"),
                },
            ],
        )
        .unwrap();
        (k, BlockCtx::new(100, Params::default()))
    }

    #[test]
    fn test_pipeline_orders_reputers_inferers_forecasters() {
        let (mut k, ctx) = seeded_keeper(true);
        let (distribution, reputer_total) =
            generate_topic_participant_rewards(&ctx, &mut k, 1, &dec("400"), 100).unwrap();

        let shape: Vec<(TaskKind, &str)> =
            distribution.iter().map(|r| (r.kind, r.address.as_str())).collect();
        assert_eq!(
            shape,
            vec![
                (TaskKind::Reputer, "0xr1"),
                (TaskKind::Reputer, "0xr2"),
                (TaskKind::WorkerInference, "0xa1"),
                (TaskKind::WorkerInference, "0xa2"),
                (TaskKind::WorkerForecast, "0xb1"),
            ]
        );
        assert!(!reputer_total.is_zero());

        // Payout conservation: the fan-out never exceeds the topic reward.
        let mut total = Dec::zero();
        for entry in &distribution {
            assert!(!entry.amount.is_negative());
            total = total.checked_add(&entry.amount).unwrap();
        }
        assert!(total <= dec("400"));
    }

    #[test]
    fn test_pipeline_without_forecasters_pays_no_forecast_task() {
        let (mut k, ctx) = seeded_keeper(false);
        let (distribution, _) =
            generate_topic_participant_rewards(&ctx, &mut k, 1, &dec("400"), 100).unwrap();
        assert!(distribution.iter().all(|r| r.kind != TaskKind::WorkerForecast));
        // No forecast entropy history is written either.
        assert_eq!(k.previous_task_entropy(1, TaskKind::WorkerForecast).unwrap(), None);
    }

    #[test]
    fn test_pipeline_missing_records_is_an_error() {
        let mut k = Keeper::new(MemStore::new());
        let ctx = BlockCtx::new(100, Params::default());
        assert!(matches!(
            generate_topic_participant_rewards(&ctx, &mut k, 1, &dec("400"), 100),
            Err(ChainError::MissingRecord(_))
        ));
    }
}
