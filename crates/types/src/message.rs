use crate::Block;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The unit of emission on the block stream.
///
/// For every block observed upstream exactly one message is published. It
/// names the blocks a subscriber must roll back and the blocks it must apply
/// to stay consistent with the active chain tip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Blocks to roll back, ordered from the old head down toward the
    /// common ancestor (exclusive). Empty outside of reorgs.
    pub reverted_blocks: Vec<Block>,
    /// Blocks to apply, ordered from just above the common ancestor up to
    /// the new tip.
    pub new_blocks: Vec<Block>,
}

impl Message {
    /// Builds the message for a clean extension of the current head.
    pub fn extension(block: Block) -> Self {
        Self { reverted_blocks: Vec::new(), new_blocks: vec![block] }
    }

    /// Builds the message for a resolved reorganization.
    pub const fn reorg(reverted_blocks: Vec<Block>, new_blocks: Vec<Block>) -> Self {
        Self { reverted_blocks, new_blocks }
    }

    /// The hash of the tip this message establishes, if any.
    ///
    /// Subscribers deduplicate re-deliveries by keying on this value.
    pub fn tip(&self) -> Option<B256> {
        self.new_blocks.last().map(|b| b.hash)
    }
}
