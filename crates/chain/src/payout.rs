//! Payout engine.
//!
//! Fans a topic's `TaskReward` list out to the ledger, in list order.
//!
//! ## Credit paths (consensus-critical order)
//!
//! | Kind | Movement |
//! |------|----------|
//! | Reputer | rewards module → staking module, then stake credit under `(topic, address)` |
//! | Worker  | rewards module → decoded account address |
//!
//! ## Failure policy
//!
//! Per-entry, never fatal: a failed entry is recorded and the loop continues
//! with the next participant. A reputer entry whose module transfer succeeds
//! but whose stake credit fails leaves tokens parked in the staking module
//! without attribution; the inconsistency is recorded and tolerated. The
//! orchestrator reads a non-empty error list as "skip pruning for this
//! topic" so the records stay settleable.
//!
//! Only arithmetic failures (an amount that cannot be trimmed to an integer)
//! escape as fatal, per the engine-wide error taxonomy.

use std::str::FromStr;

use crate::ctx::BlockCtx;
use crate::error::{ChainError, PayoutError, PayoutErrorKind};
use crate::keeper::{Bank, Stake, REWARDS_ACCOUNT, STAKING_ACCOUNT};
use crate::types::{Address, TaskKind, TaskReward};

pub fn payout_rewards<K: Bank + Stake>(
    ctx: &BlockCtx,
    keeper: &mut K,
    rewards: &[TaskReward],
) -> Result<Vec<PayoutError>, ChainError> {
    let mut errors = Vec::new();

    for reward in rewards {
        if reward.amount.is_zero() {
            continue;
        }
        // Dust below one base unit trims to zero and moves nothing.
        let amount = reward.amount.abs().trim()?;

        match reward.kind {
            TaskKind::Reputer => {
                if let Err(err) =
                    keeper.send_module_to_module(REWARDS_ACCOUNT, STAKING_ACCOUNT, &amount)
                {
                    errors.push(PayoutError {
                        topic_id: reward.topic_id,
                        address: reward.address.clone(),
                        kind: PayoutErrorKind::Transfer(match err {
                            ChainError::Bank(bank_err) => bank_err,
                            other => {
                                return Err(other);
                            }
                        }),
                    });
                    continue;
                }
                if let Err(err) = keeper.add_stake(reward.topic_id, &reward.address, &amount) {
                    ctx.warn(&format!(
                        "stake credit failed after module transfer for {} in topic {}: {err}",
                        reward.address, reward.topic_id
                    ));
                    errors.push(PayoutError {
                        topic_id: reward.topic_id,
                        address: reward.address.clone(),
                        kind: PayoutErrorKind::StakeCredit(err.to_string()),
                    });
                    continue;
                }
            }
            TaskKind::WorkerInference | TaskKind::WorkerForecast => {
                let account = match Address::from_str(&reward.address) {
                    Ok(account) => account,
                    Err(err) => {
                        errors.push(PayoutError {
                            topic_id: reward.topic_id,
                            address: reward.address.clone(),
                            kind: PayoutErrorKind::BadAddress(err),
                        });
                        continue;
                    }
                };
                if let Err(err) =
                    keeper.send_module_to_account(REWARDS_ACCOUNT, &account, &amount)
                {
                    errors.push(PayoutError {
                        topic_id: reward.topic_id,
                        address: reward.address.clone(),
                        kind: PayoutErrorKind::AccountTransfer(match err {
                            ChainError::Bank(bank_err) => bank_err,
                            other => {
                                return Err(other);
                            }
                        }),
                    });
                    continue;
                }
            }
        }
    }

    Ok(errors)
}
