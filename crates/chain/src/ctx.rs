//! Block execution context.
//!
//! Everything the engine needs besides the keeper: the height being
//! processed and the parameter snapshot taken at the start of the block.
//! Logging goes through here so every consensus log line carries the height.

use crate::params::Params;
use crate::types::BlockHeight;

pub struct BlockCtx {
    pub block_height: BlockHeight,
    pub params: Params,
}

impl BlockCtx {
    pub fn new(block_height: BlockHeight, params: Params) -> Self {
        BlockCtx { block_height, params }
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!(block_height = self.block_height, "{message}");
    }

    pub fn info(&self, message: &str) {
        tracing::info!(block_height = self.block_height, "{message}");
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!(block_height = self.block_height, "{message}");
    }
}
