//! Block proposal logic.
//!
//! The proposer is responsible for assembling an unsealed candidate on
//! top of the current tip, given a view of the chain and a transaction
//! pool. Sealing happens elsewhere (miner or staking manager).

use std::collections::VecDeque;

use crate::types::{BlockCandidate, BlockHash, Transaction};

use super::config::ConsensusConfig;
use super::store::BlockStore;

/// Abstract transaction pool interface.
///
/// Consensus does not care how transactions are stored or gossiped; it only
/// needs a way to ask for a batch of transactions for the next block.
pub trait TxPool {
    /// Selects up to `max_txs` transactions for inclusion in a block.
    fn select_for_block(&mut self, max_txs: usize) -> Vec<Transaction>;
}

/// Pool that never yields anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyTxPool;

impl TxPool for EmptyTxPool {
    fn select_for_block(&mut self, _max_txs: usize) -> Vec<Transaction> {
        Vec::new()
    }
}

/// A fixed batch, drained front to back.
impl TxPool for Vec<Transaction> {
    fn select_for_block(&mut self, max_txs: usize) -> Vec<Transaction> {
        let take = max_txs.min(self.len());
        self.drain(0..take).collect()
    }
}

/// Simple in-memory transaction pool backed by a FIFO queue.
///
/// Gossip handlers and HTTP routes push transactions into the queue; the
/// proposer drains them when constructing blocks.
#[derive(Clone, Debug, Default)]
pub struct QueuedTxPool {
    queue: VecDeque<Transaction>,
}

impl QueuedTxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a transaction unless one with the same id is already queued.
    /// Returns `true` if it was added.
    pub fn push(&mut self, tx: Transaction) -> bool {
        if self.queue.iter().any(|queued| queued.id == tx.id) {
            return false;
        }
        self.queue.push_back(tx);
        true
    }

    /// Puts `txs` back at the front of the queue in their original order,
    /// skipping ids that are queued already. Returns how many were restored.
    pub fn requeue(&mut self, txs: Vec<Transaction>) -> usize {
        let mut restored = 0;
        for tx in txs.into_iter().rev() {
            if self.queue.iter().any(|queued| queued.id == tx.id) {
                continue;
            }
            self.queue.push_front(tx);
            restored += 1;
        }
        restored
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl TxPool for QueuedTxPool {
    fn select_for_block(&mut self, max_txs: usize) -> Vec<Transaction> {
        let take = max_txs.min(self.queue.len());
        self.queue.drain(0..take).collect()
    }
}

/// Configurable block proposer.
///
/// This struct is stateless with respect to the chain; it
/// uses a [`BlockStore`] and [`TxPool`] provided at call time.
#[derive(Clone, Debug)]
pub struct Proposer {
    pub max_block_txs: usize,
    /// When set, every proposed block starts with a coinbase paying this key.
    pub reward_pub_key: Option<Vec<u8>>,
}

impl Proposer {
    /// Constructs a proposer from a [`ConsensusConfig`].
    pub fn from_config(cfg: &ConsensusConfig) -> Self {
        Self {
            max_block_txs: cfg.max_block_txs,
            reward_pub_key: None,
        }
    }

    pub fn with_reward_key(mut self, pub_key: Option<Vec<u8>>) -> Self {
        self.reward_pub_key = pub_key;
        self
    }

    /// Builds a candidate on top of the current tip.
    ///
    /// With an empty store the candidate points at the zero digest, i.e. it
    /// is a genesis candidate.
    pub fn build_candidate<S, P>(
        &self,
        store: &S,
        payload: Vec<u8>,
        tx_pool: &mut P,
        timestamp: u64,
    ) -> BlockCandidate
    where
        S: BlockStore + ?Sized,
        P: TxPool + ?Sized,
    {
        let parent = store.tip().map(|b| b.hash).unwrap_or(BlockHash::ZERO);

        let mut txs = Vec::new();
        if let Some(key) = &self.reward_pub_key {
            txs.push(Transaction::coinbase(key, parent.0.as_bytes()));
        }
        txs.extend(tx_pool.select_for_block(self.max_block_txs));

        BlockCandidate::new(parent, payload, timestamp).with_txs(txs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryBlockStore;
    use crate::types::{COINBASE_REWARD, Seal};

    #[test]
    fn proposer_from_config_copies_limits() {
        let cfg = ConsensusConfig {
            max_block_txs: 1234,
            ..ConsensusConfig::default()
        };

        let p = Proposer::from_config(&cfg);

        assert_eq!(p.max_block_txs, cfg.max_block_txs);
        assert!(p.reward_pub_key.is_none());
    }

    #[test]
    fn candidate_on_empty_store_points_at_zero_digest() {
        let p = Proposer::from_config(&ConsensusConfig::default());
        let c = p.build_candidate(&InMemoryBlockStore::new(), b"g".to_vec(), &mut EmptyTxPool, 1);
        assert_eq!(c.previous_hash, BlockHash::ZERO);
        assert!(c.txs.is_empty());
    }

    #[test]
    fn candidate_extends_tip_and_drains_pool() {
        let mut store = InMemoryBlockStore::new();
        let genesis = BlockCandidate::new(BlockHash::ZERO, b"g".to_vec(), 0).seal(
            Seal::ProofOfWork {
                nonce: 0,
                difficulty_bits: 0,
            },
        );
        let tip_hash = genesis.hash;
        store.push(genesis);

        let mut pool = QueuedTxPool::new();
        assert!(pool.push(Transaction::coinbase(b"a", b"")));
        assert!(pool.push(Transaction::coinbase(b"b", b"")));
        assert!(pool.push(Transaction::coinbase(b"c", b"")));
        // Same id twice is ignored.
        assert!(!pool.push(Transaction::coinbase(b"c", b"")));

        let p = Proposer {
            max_block_txs: 2,
            reward_pub_key: Some(b"miner".to_vec()),
        };
        let c = p.build_candidate(&store, b"next".to_vec(), &mut pool, 5);

        assert_eq!(c.previous_hash, tip_hash);
        assert_eq!(c.txs.len(), 3);
        assert!(c.txs[0].is_coinbase());
        assert_eq!(c.txs[0].outputs[0].value, COINBASE_REWARD);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn requeue_restores_batch_ahead_of_newer_txs() {
        let mut pool = QueuedTxPool::new();
        pool.push(Transaction::coinbase(b"a", b""));
        pool.push(Transaction::coinbase(b"b", b""));
        let batch = pool.select_for_block(2);

        pool.push(Transaction::coinbase(b"c", b""));
        pool.push(batch[1].clone());
        assert_eq!(pool.requeue(batch.clone()), 1);

        let order: Vec<_> = pool.select_for_block(10).into_iter().map(|tx| tx.id).collect();
        assert_eq!(
            order,
            vec![batch[0].id, Transaction::coinbase(b"c", b"").id, batch[1].id]
        );
    }

    #[test]
    fn reward_coinbase_is_unique_per_parent() {
        let p = Proposer {
            max_block_txs: 0,
            reward_pub_key: Some(b"miner".to_vec()),
        };

        let mut store = InMemoryBlockStore::new();
        let first = p.build_candidate(&store, b"g".to_vec(), &mut EmptyTxPool, 0);
        store.push(first.clone().seal(Seal::ProofOfWork {
            nonce: 0,
            difficulty_bits: 0,
        }));
        let second = p.build_candidate(&store, b"next".to_vec(), &mut EmptyTxPool, 1);

        assert_ne!(first.txs[0].id, second.txs[0].id);

        let mut pool = QueuedTxPool::new();
        assert!(pool.push(first.txs[0].clone()));
        assert!(pool.push(second.txs[0].clone()));
    }
}
