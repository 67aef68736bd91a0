//! Module parameters.
//!
//! One serde struct stored under a single key. Changing any of these changes
//! consensus output and requires coordinated governance.

use std::str::FromStr;

use cortex_common::Dec;
use serde::{Deserialize, Serialize};

fn dec(literal: &str) -> Dec {
    // Static parameter literals only; checked at first use in any build.
    Dec::from_str(literal).expect("static parameter literal")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Cap on the number of topics paid out per block (the top-N cut).
    pub max_topics_per_block: u64,
    /// Topics below this weight are inactivated at the filter step.
    pub min_topic_weight: Dec,
    /// Pruning safety margin, in epochs behind the oldest unfulfilled nonce.
    pub min_epoch_length_record_limit: i64,
    /// Score-shaping steepness per task.
    pub p_reward_reputer: Dec,
    pub p_reward_inference: Dec,
    pub p_reward_forecast: Dec,
    /// Score-shaping offsets for the worker tasks.
    pub c_reward_inference: Dec,
    pub c_reward_forecast: Dec,
    /// EMA smoothing for task entropies.
    pub task_reward_alpha: Dec,
    /// Entropy scaling.
    pub beta_entropy: Dec,
    /// Monthly boundary for the staked-reputer percentage snapshot.
    pub blocks_per_month: u64,
    /// Exponents of the topic weight `stake^μ · (revenue/epoch)^ν`.
    pub stake_importance: Dec,
    pub fee_importance: Dec,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            max_topics_per_block: 128,
            min_topic_weight: dec("0.01"),
            min_epoch_length_record_limit: 3,
            p_reward_reputer: dec("1.5"),
            p_reward_inference: dec("1.5"),
            p_reward_forecast: dec("1.5"),
            c_reward_inference: dec("0.75"),
            c_reward_forecast: dec("0.25"),
            task_reward_alpha: dec("0.1"),
            beta_entropy: dec("0.25"),
            blocks_per_month: 525_960,
            stake_importance: dec("0.5"),
            fee_importance: dec("0.5"),
        }
    }
}

impl Params {
    /// Reject parameter sets that would make the engine undefined.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_topics_per_block == 0 {
            return Err("max_topics_per_block must be at least 1".to_string());
        }
        if self.min_topic_weight.is_negative() {
            return Err("min_topic_weight must not be negative".to_string());
        }
        if self.min_epoch_length_record_limit < 0 {
            return Err("min_epoch_length_record_limit must not be negative".to_string());
        }
        let one = Dec::one();
        if self.task_reward_alpha.is_negative() || one.lt(&self.task_reward_alpha) {
            return Err("task_reward_alpha must be within [0, 1]".to_string());
        }
        if self.beta_entropy.is_negative() {
            return Err("beta_entropy must not be negative".to_string());
        }
        if self.blocks_per_month == 0 {
            return Err("blocks_per_month must be at least 1".to_string());
        }
        Ok(())
    }
}
