//! Core types for the reward distribution engine.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use cortex_common::{Dec, Int};
use serde::{Deserialize, Serialize};

/// Topic identifier.
pub type TopicId = u64;

/// Block height. Negative heights never occur on chain; the signed type
/// matches the pruning arithmetic, which can legitimately go below zero.
pub type BlockHeight = i64;

/// 20-byte account address, rendered as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; 20]);

impl Address {
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("0x").ok_or_else(|| format!("missing 0x prefix: {s:?}"))?;
        let bytes = hex::decode(body).map_err(|e| format!("bad hex in {s:?}: {e}"))?;
        let arr: [u8; 20] = bytes
            .try_into()
            .map_err(|_| format!("address must be 20 bytes: {s:?}"))?;
        Ok(Address(arr))
    }
}

/// An inference market. Weight, revenue, nonces and scores are keyed
/// separately; this is only the slow-changing registration record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: TopicId,
    /// Blocks per scoring epoch. A topic with no epoch progress has zero
    /// weight and cannot win a payout cut.
    pub epoch_length: i64,
    /// Blocks between a worker nonce and the reputer ground truth for it.
    pub ground_truth_lag: i64,
    pub active: bool,
}

/// Fee revenue accumulator for a topic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFeeRevenue {
    pub revenue: Int,
    /// Height of the last reset. Zero if never reset.
    pub epoch: BlockHeight,
}

/// The network-accepted loss bundle for a topic at a block.
///
/// Per-actor maps are ordered by actor id, which fixes every downstream
/// iteration order. Immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLossBundle {
    pub topic_id: TopicId,
    pub block_height: BlockHeight,
    /// Loss of the naive baseline (median of inferences, no weighting).
    pub naive_value: Dec,
    /// Loss of the full weighted network inference.
    pub combined_value: Dec,
    /// Accepted per-inferer losses.
    pub inferer_losses: BTreeMap<String, Dec>,
    /// Accepted per-forecaster losses of the forecast-implied inferences.
    pub forecaster_losses: BTreeMap<String, Dec>,
}

/// One reputer's reported view of the network losses at a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputerReport {
    pub reputer: String,
    pub naive_value: Dec,
    pub combined_value: Dec,
}

/// The three reward-bearing tasks of a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TaskKind {
    Reputer,
    WorkerInference,
    WorkerForecast,
}

impl TaskKind {
    /// Stable single-byte tag used in storage keys.
    pub const fn key_tag(&self) -> u8 {
        match self {
            TaskKind::Reputer => b'r',
            TaskKind::WorkerInference => b'i',
            TaskKind::WorkerForecast => b'f',
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Reputer => "reputer",
            TaskKind::WorkerInference => "inference",
            TaskKind::WorkerForecast => "forecast",
        };
        write!(f, "{name}")
    }
}

/// One pending payment to one participant of one topic.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskReward {
    pub topic_id: TopicId,
    /// Hex account string; decoded into an [`Address`] only at payout time.
    pub address: String,
    pub amount: Dec,
    pub kind: TaskKind,
}
