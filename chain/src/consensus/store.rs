//! Storage abstraction used by the chain.

use crate::types::{Block, BlockHash};

/// Abstract storage interface for an ordered, append-only ledger.
///
/// Implementations keep blocks in append order; index 0 is genesis. The
/// interface is intentionally small: the chain only needs ordered access,
/// lookup by hash, and a way to push onto the tip.
pub trait BlockStore {
    /// All blocks in append order.
    fn blocks(&self) -> &[Block];

    /// Fetches a block by hash, if present.
    fn get_block(&self, hash: &BlockHash) -> Option<&Block>;

    /// Appends a block after the current tip.
    fn push(&mut self, block: Block);

    /// Most recently appended block, if any.
    fn tip(&self) -> Option<&Block> {
        self.blocks().last()
    }

    fn len(&self) -> usize {
        self.blocks().len()
    }

    fn is_empty(&self) -> bool {
        self.blocks().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal store; good for checking trait-object use and the default
    /// tip semantics without caring about hash lookups.
    #[derive(Default)]
    struct VecStore {
        blocks: Vec<Block>,
    }

    impl BlockStore for VecStore {
        fn blocks(&self) -> &[Block] {
            &self.blocks
        }

        fn get_block(&self, hash: &BlockHash) -> Option<&Block> {
            self.blocks.iter().find(|b| &b.hash == hash)
        }

        fn push(&mut self, block: Block) {
            self.blocks.push(block);
        }
    }

    #[test]
    fn block_store_trait_is_object_safe() {
        fn use_trait_object(store: &mut dyn BlockStore) -> usize {
            store.len()
        }

        let mut store = VecStore::default();
        assert_eq!(use_trait_object(&mut store), 0);
    }

    #[test]
    fn tip_is_last_pushed_block() {
        use crate::types::{BlockCandidate, Seal};

        let mut store = VecStore::default();
        assert!(store.tip().is_none());
        assert!(store.is_empty());

        let seal = Seal::ProofOfWork {
            nonce: 0,
            difficulty_bits: 0,
        };
        let a = BlockCandidate::new(BlockHash::ZERO, b"a".to_vec(), 1).seal(seal.clone());
        let b = BlockCandidate::new(a.hash, b"b".to_vec(), 2).seal(seal);
        store.push(a);
        store.push(b.clone());

        assert_eq!(store.tip().map(|t| t.hash), Some(b.hash));
        assert_eq!(store.get_block(&b.hash), Some(&b));
        assert_eq!(store.len(), 2);
    }
}
