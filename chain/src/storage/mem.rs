//! In-memory block store.
//!
//! The chain lives in process memory: blocks are kept in a `Vec` in
//! append order, with a `HashMap` from `BlockHash` to position for lookups.

use std::collections::HashMap;

use crate::consensus::store::BlockStore;
use crate::types::{Block, BlockHash};

/// In-memory implementation of [`BlockStore`].
#[derive(Clone, Debug, Default)]
pub struct InMemoryBlockStore {
    blocks: Vec<Block>,
    by_hash: HashMap<BlockHash, usize>,
}

impl InMemoryBlockStore {
    /// Creates a new, empty in-memory block store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutable access to a stored block.
    ///
    /// This bypasses every chain invariant and exists for tooling and
    /// tests that simulate tampering. The hash index keeps pointing at the
    /// position recorded when the block was pushed.
    pub fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }
}

impl BlockStore for InMemoryBlockStore {
    fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    fn get_block(&self, hash: &BlockHash) -> Option<&Block> {
        self.by_hash.get(hash).and_then(|&i| self.blocks.get(i))
    }

    fn push(&mut self, block: Block) {
        self.by_hash.insert(block.hash, self.blocks.len());
        self.blocks.push(block);
    }
}
