//! Top-N topic selection.
//!
//! Winners are the N heaviest topics. Ties are broken by a pseudo-random
//! permutation every validator derives identically from on-chain state: the
//! SHA3-256 digest of `be64(block_height) ‖ be64(topic_id)`, compared
//! lexicographically, with the topic id as the final disambiguator.

use std::collections::BTreeMap;

use cortex_common::Dec;
use sha3::{Digest, Sha3_256};

use crate::types::{BlockHeight, TopicId};

fn tie_rank(block_height: BlockHeight, topic_id: TopicId) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update((block_height as u64).to_be_bytes());
    hasher.update(topic_id.to_be_bytes());
    hasher.finalize().into()
}

/// The at-most-`max_topics` heaviest topics of `weights`.
pub fn skim_top_topics_by_weight_desc(
    weights: &BTreeMap<TopicId, Dec>,
    max_topics: u64,
    block_height: BlockHeight,
) -> BTreeMap<TopicId, Dec> {
    let mut ranked: Vec<(TopicId, Dec, [u8; 32])> = weights
        .iter()
        .map(|(&id, &weight)| (id, weight, tie_rank(block_height, id)))
        .collect();

    ranked.sort_by(|a, b| {
        b.1.cmp(&a.1)
            .then_with(|| a.2.cmp(&b.2))
            .then_with(|| a.0.cmp(&b.0))
    });

    ranked
        .into_iter()
        .take(max_topics as usize)
        .map(|(id, weight, _)| (id, weight))
        .collect()
}
