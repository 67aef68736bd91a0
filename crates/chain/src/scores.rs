//! Score engine.
//!
//! Scores are deterministic `Dec` functions of the network loss bundle at
//! the settled block, persisted per `(topic, kind, block, actor)`:
//!
//! - inferer:    `ln(naive) − ln(loss[a])` — log-improvement of the actor's
//!   inference over the naive baseline.
//! - forecaster: `ln(naive) − ln(loss[a])` over the forecast-implied losses.
//! - reputer:    `1 / (1 + d)` with
//!   `d = |ln rep.combined − ln net.combined| + |ln rep.naive − ln net.naive|`
//!   — proximity of the reported losses to the accepted network losses.
//!
//! Losses are positive by construction upstream; a zero or negative loss
//! surfaces as a fatal arithmetic error. All functions return actors in
//! ascending id order.

use cortex_common::Dec;

use crate::error::ChainError;
use crate::keeper::ScoreStore;
use crate::types::{BlockHeight, NetworkLossBundle, ReputerReport, TaskKind, TopicId};

fn log_improvement(baseline: &Dec, loss: &Dec) -> Result<Dec, ChainError> {
    Ok(baseline.ln()?.checked_sub(&loss.ln()?)?)
}

/// Inferer scores from the accepted per-inferer losses.
pub fn generate_inference_scores<K: ScoreStore>(
    keeper: &mut K,
    topic_id: TopicId,
    block_height: BlockHeight,
    bundle: &NetworkLossBundle,
) -> Result<Vec<(String, Dec)>, ChainError> {
    let mut scores = Vec::with_capacity(bundle.inferer_losses.len());
    for (actor, loss) in &bundle.inferer_losses {
        let score = log_improvement(&bundle.naive_value, loss)?;
        keeper.set_score(topic_id, TaskKind::WorkerInference, block_height, actor, &score)?;
        scores.push((actor.clone(), score));
    }
    Ok(scores)
}

/// Forecaster scores from the accepted forecast-implied losses.
pub fn generate_forecast_scores<K: ScoreStore>(
    keeper: &mut K,
    topic_id: TopicId,
    block_height: BlockHeight,
    bundle: &NetworkLossBundle,
) -> Result<Vec<(String, Dec)>, ChainError> {
    let mut scores = Vec::with_capacity(bundle.forecaster_losses.len());
    for (actor, loss) in &bundle.forecaster_losses {
        let score = log_improvement(&bundle.naive_value, loss)?;
        keeper.set_score(topic_id, TaskKind::WorkerForecast, block_height, actor, &score)?;
        scores.push((actor.clone(), score));
    }
    Ok(scores)
}

/// Reputer scores from proximity of their reports to the accepted losses.
pub fn generate_reputer_scores<K: ScoreStore>(
    keeper: &mut K,
    topic_id: TopicId,
    block_height: BlockHeight,
    reports: &[ReputerReport],
    bundle: &NetworkLossBundle,
) -> Result<Vec<(String, Dec)>, ChainError> {
    let accepted_combined = bundle.combined_value.ln()?;
    let accepted_naive = bundle.naive_value.ln()?;

    let mut sorted: Vec<&ReputerReport> = reports.iter().collect();
    sorted.sort_by(|a, b| a.reputer.cmp(&b.reputer));

    let mut scores = Vec::with_capacity(sorted.len());
    for report in sorted {
        let combined_gap = report.combined_value.ln()?.checked_sub(&accepted_combined)?.abs();
        let naive_gap = report.naive_value.ln()?.checked_sub(&accepted_naive)?.abs();
        let distance = combined_gap.checked_add(&naive_gap)?;
        let score = Dec::one().checked_quo(&Dec::one().checked_add(&distance)?)?;
        keeper.set_score(topic_id, TaskKind::Reputer, block_height, &report.reputer, &score)?;
        scores.push((report.reputer.clone(), score));
    }
    Ok(scores)
}
