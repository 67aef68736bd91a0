//! Reward fractions and task entropy.
//!
//! Scores are mapped through the logistic shaping function
//! `g(s; p, c) = p · σ(p·(s − c))` and normalized into fractions summing to
//! one (or all zero when every shaped score truncates to zero). The sigmoid
//! is always evaluated by exponentiating a non-positive argument, so it can
//! neither overflow nor lose determinism on extreme scores.
//!
//! Task entropy measures how dispersed the fractions are:
//! `Ĥ = β · (−Σ f·ln f)`, EMA-smoothed across settlements as
//! `H = α·Ĥ + (1−α)·H_prev` with `H_prev` defaulting to `β·ln(n)` — the
//! uniform-distribution entropy — when the topic has no history.

use cortex_common::Dec;

use crate::error::ChainError;
use crate::keeper::ScoreStore;
use crate::types::{TaskKind, TopicId};

/// Logistic score shaping `p · σ(p·(x − c))`, overflow-free.
fn shaped_score(p: &Dec, c: &Dec, x: &Dec) -> Result<Dec, ChainError> {
    let arg = p.checked_mul(&x.checked_sub(c)?)?;
    let one = Dec::one();
    if arg.is_negative() {
        // p·e^a / (1 + e^a) with a < 0, so e^a ≤ 1.
        let ea = arg.exp()?;
        Ok(p.checked_mul(&ea)?.checked_quo(&one.checked_add(&ea)?)?)
    } else {
        // p / (1 + e^(−a)) with a ≥ 0.
        let ena = arg.neg().exp()?;
        Ok(p.checked_quo(&one.checked_add(&ena)?)?)
    }
}

/// Normalized reward fractions, in the same actor order as `scores`.
///
/// When every shaped score truncates to zero the fractions are all zero:
/// the task then carries no entropy and no reward, which is the correct
/// degenerate outcome rather than an error.
pub fn reward_fractions(
    p: &Dec,
    c: &Dec,
    scores: &[(String, Dec)],
) -> Result<Vec<(String, Dec)>, ChainError> {
    let mut shaped = Vec::with_capacity(scores.len());
    let mut total = Dec::zero();
    for (actor, score) in scores {
        let g = shaped_score(p, c, score)?;
        total = total.checked_add(&g)?;
        shaped.push((actor.clone(), g));
    }
    if total.is_zero() {
        return Ok(shaped.into_iter().map(|(actor, _)| (actor, Dec::zero())).collect());
    }
    shaped
        .into_iter()
        .map(|(actor, g)| Ok((actor, g.checked_quo(&total)?)))
        .collect()
}

/// Unsmoothed entropy `β · (−Σ f·ln f)`. Zero fractions contribute zero.
pub fn raw_task_entropy(beta: &Dec, fractions: &[Dec]) -> Result<Dec, ChainError> {
    let mut sum = Dec::zero();
    for fraction in fractions {
        if fraction.is_zero() {
            continue;
        }
        sum = sum.checked_add(&fraction.checked_mul(&fraction.ln()?)?)?;
    }
    Ok(beta.checked_mul(&sum.neg())?)
}

/// EMA-smoothed task entropy; persists the smoothed value as the next
/// settlement's history. An empty actor set yields zero without touching
/// state.
pub fn task_entropy<K: ScoreStore>(
    keeper: &mut K,
    topic_id: TopicId,
    kind: TaskKind,
    alpha: &Dec,
    beta: &Dec,
    fractions: &[Dec],
) -> Result<Dec, ChainError> {
    if fractions.is_empty() {
        return Ok(Dec::zero());
    }

    let raw = raw_task_entropy(beta, fractions)?;
    let previous = match keeper.previous_task_entropy(topic_id, kind)? {
        Some(entropy) => entropy,
        None => beta.checked_mul(&Dec::from(fractions.len() as u64).ln()?)?,
    };
    let retained = Dec::one().checked_sub(alpha)?;
    let smoothed = alpha
        .checked_mul(&raw)?
        .checked_add(&retained.checked_mul(&previous)?)?;
    keeper.set_task_entropy(topic_id, kind, &smoothed)?;
    Ok(smoothed)
}
