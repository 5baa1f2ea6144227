//! Chain handle shared between async tasks.
//!
//! Mining is CPU-bound, so appends do not hold the chain lock while
//! searching for a nonce. An append snapshots the tip, mines on a blocking
//! thread, then re-locks and calls [`Chain::try_extend`]. If another
//! writer got there first the block is stale: the loser re-reads the tip
//! and mines again. Exactly one block ever extends a given parent.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::types::{Address, Block, BlockHash, Transaction};

use super::chain::{Chain, current_unix_timestamp};
use super::error::{ConsensusError, ValidationError};
use super::pow::{CancelFlag, MiningOutcome};
use super::proposer::{QueuedTxPool, TxPool};
use super::stake::StakingManager;

/// Cloneable handle to one in-memory [`Chain`].
#[derive(Clone)]
pub struct SharedChain {
    chain: Arc<Mutex<Chain>>,
    in_flight: Arc<parking_lot::Mutex<Vec<CancelFlag>>>,
}

impl SharedChain {
    pub fn new(chain: Chain) -> Self {
        Self {
            chain: Arc::new(Mutex::new(chain)),
            in_flight: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// Mines `payload` (plus `txs`) onto the tip, retrying on lost races.
    /// On success returns the block together with its chain index.
    ///
    /// Returns [`ConsensusError::MiningCancelled`] if mining was cancelled
    /// while the tip stayed put, and [`ConsensusError::RetriesExhausted`]
    /// after `max_append_retries` lost races.
    pub async fn append(
        &self,
        payload: Vec<u8>,
        txs: Vec<Transaction>,
    ) -> Result<(usize, Block), ConsensusError> {
        let max_retries = self.chain.lock().await.config().max_append_retries;

        for attempt in 0..=max_retries {
            let (candidate, miner, metrics) = {
                let chain = self.chain.lock().await;
                let mut batch = txs.clone();
                let candidate =
                    chain.candidate(payload.clone(), &mut batch, current_unix_timestamp());
                (candidate, chain.miner().clone(), chain.metrics().cloned())
            };
            let parent = candidate.previous_hash;

            let flag = self.register_flag();
            let search_flag = flag.clone();
            let start = Instant::now();
            let joined =
                tokio::task::spawn_blocking(move || miner.search(candidate, &search_flag)).await;
            self.unregister_flag(&flag);

            let outcome =
                joined.map_err(|e| ConsensusError::Other(format!("mining task failed: {e}")))?;
            if let Some(m) = &metrics {
                m.record_mining(&outcome, start.elapsed());
            }

            match outcome {
                MiningOutcome::Sealed { block, .. } => {
                    let mut chain = self.chain.lock().await;
                    let index = chain.len();
                    match chain.try_extend(block.clone()) {
                        Ok(_) => {
                            drop(chain);
                            // Anyone still mining on `parent` is now stale.
                            self.cancel_mining();
                            return Ok((index, block));
                        }
                        Err(ConsensusError::StaleTip { tip, .. }) => {
                            tracing::debug!(attempt, %parent, %tip, "lost append race, retrying");
                        }
                        Err(e) => return Err(e),
                    }
                }
                MiningOutcome::Cancelled { attempts } => {
                    let tip = self.chain.lock().await.tip_hash();
                    if tip == parent {
                        tracing::info!(attempts, %parent, "mining abandoned");
                        return Err(ConsensusError::MiningCancelled);
                    }
                    tracing::debug!(attempt, %parent, %tip, "tip moved during mining, retrying");
                }
                MiningOutcome::Exhausted => {
                    return Err(ConsensusError::Other("nonce space exhausted".to_string()));
                }
            }
        }

        Err(ConsensusError::RetriesExhausted(max_retries))
    }

    /// Like [`SharedChain::append`], taking up to `max_block_txs`
    /// transactions from `pool`. If the append fails they are put back at
    /// the front of the pool.
    pub async fn append_from_pool(
        &self,
        payload: Vec<u8>,
        pool: &parking_lot::Mutex<QueuedTxPool>,
    ) -> Result<(usize, Block), ConsensusError> {
        let max_txs = self.chain.lock().await.config().max_block_txs;
        let txs = pool.lock().select_for_block(max_txs);

        let result = self.append(payload, txs.clone()).await;
        if let Err(e) = &result {
            if !txs.is_empty() {
                let restored = pool.lock().requeue(txs);
                tracing::debug!(restored, error = %e, "append failed, transactions returned to pool");
            }
        }
        result
    }

    /// Seals `payload` by stake and appends it under the chain lock.
    /// On success returns the block together with its chain index.
    pub async fn append_by_stake(
        &self,
        payload: Vec<u8>,
        claimed: &Address,
        staking: &StakingManager,
    ) -> Result<(usize, Block), ConsensusError> {
        let appended = {
            let mut chain = self.chain.lock().await;
            let block = chain.append_by_stake(payload, claimed, staking)?.clone();
            (chain.len().saturating_sub(1), block)
        };
        self.cancel_mining();
        Ok(appended)
    }

    /// Imports a sealed block received from elsewhere.
    ///
    /// On success any in-flight local mining is cancelled, since it targets
    /// a parent that is no longer the tip.
    pub async fn import(&self, block: Block) -> Result<BlockHash, ConsensusError> {
        let hash = self.chain.lock().await.try_extend(block)?;
        self.cancel_mining();
        Ok(hash)
    }

    /// Raises the cancel flag of every in-flight append.
    pub fn cancel_mining(&self) {
        for flag in self.in_flight.lock().iter() {
            flag.cancel();
        }
    }

    /// Number of appends currently searching for a nonce.
    pub fn mining_in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    pub async fn validate(&self) -> bool {
        self.chain.lock().await.validate()
    }

    pub async fn validate_detailed(&self) -> Result<(), ValidationError> {
        self.chain.lock().await.validate_detailed()
    }

    /// Copy of all blocks in order.
    pub async fn blocks(&self) -> Vec<Block> {
        self.chain.lock().await.blocks().to_vec()
    }

    pub async fn tip(&self) -> Option<Block> {
        self.chain.lock().await.tip().cloned()
    }

    pub async fn len(&self) -> usize {
        self.chain.lock().await.len()
    }

    /// Runs `f` with exclusive access to the chain.
    pub async fn with_chain<R>(&self, f: impl FnOnce(&mut Chain) -> R) -> R {
        let mut chain = self.chain.lock().await;
        f(&mut chain)
    }

    fn register_flag(&self) -> CancelFlag {
        let flag = CancelFlag::new();
        self.in_flight.lock().push(flag.clone());
        flag
    }

    fn unregister_flag(&self, flag: &CancelFlag) {
        self.in_flight.lock().retain(|f| !f.same_flag(flag));
    }
}
