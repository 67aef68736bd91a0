//! Emission schedule feeding the rewards account.
//!
//! Pure functions; the block driver only consumes their output through the
//! rewards module balance. The emission rate per unit staked token is an
//! EMA toward a target derived from the ecosystem balance:
//!
//! ```text
//! ê_i = (f_e · T_total / N_staked) · (N_circ / N_total)
//! e_i = α_e · ê_i + (1 − α_e) · e_{i−1}
//! E_i = e_i · N_staked
//! ```
//!
//! with the per-timestep smoothing factor `α̂_e = 1 − (1 − α_e)^Δt` for a
//! timestep of `Δt` fractions of a month.

use cortex_common::{Dec, Int, MathError};

use crate::error::ChainError;

/// Total emission for one timestep: `trim(rate · staked)`.
pub fn total_emission_per_timestep(
    rate_per_token: &Dec,
    staked_tokens: &Int,
) -> Result<Int, ChainError> {
    Ok(rate_per_token.checked_mul(&Dec::from(staked_tokens))?.trim()?)
}

/// EMA of the emission rate toward its target:
/// `α · target + (1 − α) · previous`.
pub fn reward_emission_per_unit_staked_token(
    target: &Dec,
    alpha: &Dec,
    previous: &Dec,
) -> Result<Dec, ChainError> {
    let retained = Dec::one().checked_sub(alpha)?;
    Ok(alpha
        .checked_mul(target)?
        .checked_add(&retained.checked_mul(previous)?)?)
}

/// Per-timestep smoothing factor `1 − (1 − α_month)^Δt`.
pub fn smoothing_factor_per_timestep(
    alpha_per_month: &Dec,
    timesteps_per_month: u64,
) -> Result<Dec, ChainError> {
    let retained = Dec::one().checked_sub(alpha_per_month)?;
    let decayed = retained.powi(timesteps_per_month)?;
    Ok(Dec::one().checked_sub(&decayed)?)
}

/// Target emission rate per unit staked token:
/// `(f_emission · ecosystem_balance / staked) · (circulating / total)`.
pub fn target_reward_emission_per_unit_staked_token(
    f_emission: &Dec,
    ecosystem_balance: &Int,
    staked_tokens: &Int,
    circulating_supply: &Int,
    total_supply: &Int,
) -> Result<Dec, ChainError> {
    if staked_tokens.is_zero() || total_supply.is_zero() {
        return Err(MathError::DivideByZero.into());
    }
    let per_staked = f_emission
        .checked_mul(&Dec::from(ecosystem_balance))?
        .checked_quo(&Dec::from(staked_tokens))?;
    let circulating_share =
        Dec::from(circulating_supply).checked_quo(&Dec::from(total_supply))?;
    Ok(per_staked.checked_mul(&circulating_share)?)
}
