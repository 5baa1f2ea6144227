//! The chain: an ordered, append-only sequence of sealed blocks.
//!
//! [`Chain`] wires together:
//!
//! - a [`BlockStore`] holding blocks in order,
//! - a [`BlockValidator`] for per-block seal checks,
//! - a [`Miner`] for proof-of-work sealing, and
//! - a [`Proposer`] for candidate construction.
//!
//! Appending takes `&mut self`, so one chain value has at most one append
//! in flight. [`crate::consensus::SharedChain`] layers concurrent
//! appenders on top of this with an explicit stale-tip retry.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::metrics::ConsensusMetrics;
use crate::storage::InMemoryBlockStore;
use crate::types::{Address, Block, BlockCandidate, BlockHash, Transaction};

use super::config::ConsensusConfig;
use super::error::{ConsensusError, ValidationError};
use super::pow::{CancelFlag, Miner, MiningOutcome};
use super::proposer::{EmptyTxPool, Proposer, TxPool};
use super::stake::StakingManager;
use super::store::BlockStore;
use super::validator::{BlockValidator, SealValidity};

/// Returns the current wall-clock time as seconds since Unix epoch.
///
/// On error (system clock before epoch) this falls back to 0.
pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

/// Ordered chain of blocks, generic over storage and seal validation.
#[derive(Debug)]
pub struct Chain<S = InMemoryBlockStore, V = SealValidity> {
    config: ConsensusConfig,
    store: S,
    validator: V,
    miner: Miner,
    proposer: Proposer,
    metrics: Option<ConsensusMetrics>,
}

impl Chain {
    /// One-block chain with the default configuration.
    ///
    /// The genesis block carries `"Genesis Block"`, points at the zero
    /// digest and is mined at the default 16-bit difficulty.
    pub fn genesis() -> Result<Self, ConsensusError> {
        Self::genesis_with(ConsensusConfig::default())
    }

    /// One-block in-memory chain mined at `config.difficulty_bits`.
    pub fn genesis_with(config: ConsensusConfig) -> Result<Self, ConsensusError> {
        let validator = SealValidity::new(config.difficulty_bits);
        Self::with_parts(config, InMemoryBlockStore::new(), validator)
    }
}

impl<S: BlockStore> Chain<S, SealValidity> {
    /// Lets stake-sealed blocks validate against `staking`.
    pub fn with_staking(mut self, staking: Arc<StakingManager>) -> Self {
        self.validator = self.validator.with_staking(staking);
        self
    }
}

impl<S, V> Chain<S, V>
where
    S: BlockStore,
    V: BlockValidator,
{
    /// Creates a chain over `store`, mining a genesis block if it is empty.
    pub fn with_parts(config: ConsensusConfig, store: S, validator: V) -> Result<Self, ConsensusError> {
        config.validate()?;
        let miner = Miner::from_config(&config);
        let proposer = Proposer::from_config(&config);
        let mut chain = Self {
            config,
            store,
            validator,
            miner,
            proposer,
            metrics: None,
        };

        if chain.store.is_empty() {
            let candidate = BlockCandidate::new(
                BlockHash::ZERO,
                chain.config.genesis_payload.clone(),
                current_unix_timestamp(),
            );
            let genesis = chain.seal_by_work(candidate)?;
            tracing::info!(hash = %genesis.hash, nonce = genesis.nonce(), "mined genesis block");
            chain.store.push(genesis);
        }

        Ok(chain)
    }

    /// Records mining and import statistics into `metrics`.
    pub fn with_metrics(mut self, metrics: ConsensusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Prepends a coinbase paying `pub_key` to every locally built block.
    pub fn with_reward_key(mut self, pub_key: Option<Vec<u8>>) -> Self {
        self.proposer = self.proposer.with_reward_key(pub_key);
        self
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn miner(&self) -> &Miner {
        &self.miner
    }

    pub fn metrics(&self) -> Option<&ConsensusMetrics> {
        self.metrics.as_ref()
    }

    /// Returns a reference to the underlying block store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a mutable reference to the underlying block store.
    ///
    /// This is mainly useful for tests and tooling; chain logic should
    /// normally go through [`Chain::append`] or [`Chain::try_extend`].
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn blocks(&self) -> &[Block] {
        self.store.blocks()
    }

    /// Most recently appended block.
    pub fn tip(&self) -> Option<&Block> {
        self.store.tip()
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.store.tip().map(|b| b.hash).unwrap_or(BlockHash::ZERO)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Transactions carried by every block, in chain order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.store.blocks().iter().flat_map(|b| b.txs.iter())
    }

    /// Mines a block carrying `payload` on the tip and appends it.
    pub fn append(&mut self, payload: impl Into<Vec<u8>>) -> Result<&Block, ConsensusError> {
        self.append_from_pool(payload, &mut EmptyTxPool)
    }

    /// Like [`Chain::append`], also draining transactions from `tx_pool`.
    pub fn append_from_pool<P>(
        &mut self,
        payload: impl Into<Vec<u8>>,
        tx_pool: &mut P,
    ) -> Result<&Block, ConsensusError>
    where
        P: TxPool + ?Sized,
    {
        let candidate = self.candidate(payload.into(), tx_pool, current_unix_timestamp());
        let block = self.seal_by_work(candidate)?;
        self.try_extend(block)?;
        self.last_appended()
    }

    /// Seals `payload` by stake under `claimed` and appends it.
    ///
    /// Fails with [`crate::consensus::StakeError::NotSelected`] unless
    /// `claimed` is the validator `staking` selects right now.
    pub fn append_by_stake(
        &mut self,
        payload: impl Into<Vec<u8>>,
        claimed: &Address,
        staking: &StakingManager,
    ) -> Result<&Block, ConsensusError> {
        let candidate = self.candidate(payload.into(), &mut EmptyTxPool, current_unix_timestamp());
        let block = staking.seal_by_stake(candidate, claimed)?;
        self.try_extend(block)?;
        self.last_appended()
    }

    /// Builds an unsealed candidate on the current tip.
    pub fn candidate<P>(&self, payload: Vec<u8>, tx_pool: &mut P, timestamp: u64) -> BlockCandidate
    where
        P: TxPool + ?Sized,
    {
        self.proposer
            .build_candidate(&self.store, payload, tx_pool, timestamp)
    }

    /// Appends an already sealed block if it extends the current tip.
    ///
    /// Used for blocks mined off-lock and for blocks received from peers.
    /// A block whose parent is no longer the tip yields
    /// [`ConsensusError::StaleTip`]; the caller should re-read the tip and
    /// build a new candidate.
    pub fn try_extend(&mut self, block: Block) -> Result<BlockHash, ConsensusError> {
        let result = self.check_extension(&block);
        match &result {
            Ok(()) => {
                if let Some(m) = &self.metrics {
                    m.blocks_imported.inc();
                }
            }
            Err(_) => {
                if let Some(m) = &self.metrics {
                    m.blocks_rejected.inc();
                }
            }
        }
        result?;

        let hash = block.hash;
        tracing::debug!(
            index = self.store.len(),
            %hash,
            seal = %block.seal.kind(),
            "appended block"
        );
        self.store.push(block);
        Ok(hash)
    }

    fn check_extension(&self, block: &Block) -> Result<(), ConsensusError> {
        let tip = self.tip_hash();
        if block.previous_hash != tip {
            return Err(ConsensusError::StaleTip {
                parent: block.previous_hash,
                tip,
            });
        }

        let index = self.store.len();
        let computed = block.recompute_hash();
        if computed != block.hash {
            return Err(ValidationError::HashMismatch {
                index,
                stored: block.hash,
                computed,
            }
            .into());
        }

        self.validator.validate_extension(index, block)?;
        Ok(())
    }

    /// Returns `true` if every block links, hashes and seals correctly.
    pub fn validate(&self) -> bool {
        self.validate_detailed().is_ok()
    }

    /// Validates the whole chain, reporting the first violation.
    ///
    /// For each block in order: linkage to the predecessor (genesis must
    /// point at the zero digest), then the stored hash against the
    /// re-derived digest, then the seal policy.
    pub fn validate_detailed(&self) -> Result<(), ValidationError> {
        let blocks = self.store.blocks();
        let mut expected_parent = BlockHash::ZERO;

        for (index, block) in blocks.iter().enumerate() {
            if block.previous_hash != expected_parent {
                return Err(ValidationError::LinkageMismatch {
                    index,
                    expected: expected_parent,
                    found: block.previous_hash,
                });
            }

            let computed = block.recompute_hash();
            if computed != block.hash {
                return Err(ValidationError::HashMismatch {
                    index,
                    stored: block.hash,
                    computed,
                });
            }

            self.validator.validate(index, block)?;
            expected_parent = block.hash;
        }

        Ok(())
    }

    fn seal_by_work(&self, candidate: BlockCandidate) -> Result<Block, ConsensusError> {
        let start = Instant::now();
        let outcome = self.miner.search(candidate, &CancelFlag::new());
        if let Some(m) = &self.metrics {
            m.record_mining(&outcome, start.elapsed());
        }
        match outcome {
            MiningOutcome::Sealed { block, .. } => Ok(block),
            MiningOutcome::Cancelled { .. } => Err(ConsensusError::MiningCancelled),
            MiningOutcome::Exhausted => {
                Err(ConsensusError::Other("nonce space exhausted".to_string()))
            }
        }
    }

    fn last_appended(&self) -> Result<&Block, ConsensusError> {
        self.store
            .tip()
            .ok_or_else(|| ConsensusError::Other("chain is empty after append".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::StakeError;
    use crate::consensus::proposer::QueuedTxPool;
    use crate::consensus::validator::AcceptAllValidator;
    use crate::types::Seal;
    use proptest::prelude::*;

    fn test_config() -> ConsensusConfig {
        ConsensusConfig::with_difficulty(6)
    }

    fn three_block_chain() -> Chain {
        let mut chain = Chain::genesis_with(test_config()).expect("genesis");
        chain.append("Block 1 Data").expect("block 1");
        chain.append("Block 2 Data").expect("block 2");
        chain
    }

    #[test]
    fn genesis_is_a_single_sealed_block() {
        let chain = Chain::genesis_with(test_config()).unwrap();
        assert_eq!(chain.len(), 1);

        let genesis = &chain.blocks()[0];
        assert_eq!(genesis.previous_hash, BlockHash::ZERO);
        assert_eq!(genesis.payload, b"Genesis Block");
        assert!(genesis.hash_is_consistent());
        assert!(chain.validate());
    }

    #[test]
    fn default_genesis_uses_sixteen_bit_difficulty() {
        let chain = Chain::genesis().unwrap();
        assert!(matches!(
            chain.blocks()[0].seal,
            Seal::ProofOfWork {
                difficulty_bits: 16,
                ..
            }
        ));
        assert!(chain.validate());
    }

    #[test]
    fn appended_blocks_link_to_previous_tip() {
        let chain = three_block_chain();
        let blocks = chain.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].previous_hash, blocks[0].hash);
        assert_eq!(blocks[2].previous_hash, blocks[1].hash);
        assert_eq!(chain.tip().unwrap().payload, b"Block 2 Data");
        assert!(chain.validate());
    }

    #[test]
    fn payload_tamper_is_a_hash_mismatch_at_that_index() {
        let mut chain = three_block_chain();
        chain.store_mut().block_mut(1).unwrap().payload[0] ^= 0x01;

        assert!(!chain.validate());
        let err = chain.validate_detailed().unwrap_err();
        assert!(matches!(err, ValidationError::HashMismatch { index: 1, .. }));
    }

    #[test]
    fn rehashing_a_tampered_block_breaks_linkage_of_its_child() {
        let mut chain = three_block_chain();
        {
            let b = chain.store_mut().block_mut(1).unwrap();
            b.payload = b"forged".to_vec();
            b.hash = b.recompute_hash();
        }

        let err = chain.validate_detailed().unwrap_err();
        // Either the forged block misses the target, or its child no longer links.
        assert!(matches!(
            err,
            ValidationError::ProofOfWorkUnsatisfied { index: 1, .. }
                | ValidationError::LinkageMismatch { index: 2, .. }
        ));
    }

    #[test]
    fn previous_hash_tamper_is_a_linkage_mismatch() {
        let mut chain = three_block_chain();
        chain.store_mut().block_mut(1).unwrap().previous_hash = BlockHash::ZERO;

        let err = chain.validate_detailed().unwrap_err();
        assert!(matches!(err, ValidationError::LinkageMismatch { index: 1, .. }));
        assert_eq!(err.index(), 1);
    }

    #[test]
    fn genesis_must_point_at_zero_digest() {
        let mut chain = three_block_chain();
        let tip = chain.tip_hash();
        chain.store_mut().block_mut(0).unwrap().previous_hash = tip;
        assert!(matches!(
            chain.validate_detailed(),
            Err(ValidationError::LinkageMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn try_extend_rejects_stale_parent() {
        let mut chain = three_block_chain();
        let stale = chain.blocks()[0].hash;
        let block = Miner::new(6)
            .mine(BlockCandidate::new(stale, b"late".to_vec(), 9), &CancelFlag::new())
            .unwrap();

        let err = chain.try_extend(block).unwrap_err();
        assert!(matches!(err, ConsensusError::StaleTip { .. }));
        assert_eq!(chain.len(), 3);
    }

    #[test]
    fn try_extend_rejects_insufficient_work() {
        let mut chain = Chain::genesis_with(test_config()).unwrap();
        let block = BlockCandidate::new(chain.tip_hash(), b"lazy".to_vec(), 9).seal(
            Seal::ProofOfWork {
                nonce: 0,
                difficulty_bits: 0,
            },
        );

        let err = chain.try_extend(block).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Validation(ValidationError::ProofOfWorkUnsatisfied { index: 1, .. })
        ));
    }

    #[test]
    fn stake_sealed_block_appends_for_selected_validator() {
        let staking = Arc::new(StakingManager::new());
        staking.add_stake("A", 5).unwrap();
        staking.add_stake("B", 9).unwrap();

        let mut chain = Chain::genesis_with(test_config())
            .unwrap()
            .with_staking(staking.clone());

        let err = chain
            .append_by_stake("by A", &Address::from("A"), &staking)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Stake(StakeError::NotSelected { .. })
        ));

        let block = chain
            .append_by_stake("by B", &Address::from("B"), &staking)
            .unwrap();
        assert_eq!(block.validator(), Some(&Address::from("B")));
        assert_eq!(chain.len(), 2);
        assert!(chain.validate());

        chain.append("mined after stake").unwrap();
        assert!(chain.validate());
    }

    #[test]
    fn try_extend_rejects_stake_block_from_non_selected_staker() {
        let staking = Arc::new(StakingManager::new());
        staking.add_stake("A", 5).unwrap();
        staking.add_stake("B", 9).unwrap();

        let mut chain = Chain::genesis_with(test_config())
            .unwrap()
            .with_staking(staking);
        let forged = BlockCandidate::new(chain.tip_hash(), b"by A".to_vec(), 9).seal(Seal::Stake {
            validator: Address::from("A"),
        });

        let err = chain.try_extend(forged).unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Validation(ValidationError::ValidatorNotSelected { index: 1, .. })
        ));
        assert_eq!(chain.len(), 1);
        assert!(chain.validate());
    }

    #[test]
    fn stake_blocks_fail_validation_without_a_staking_manager() {
        let staking = StakingManager::new();
        staking.add_stake("B", 1).unwrap();

        let mut chain = Chain::genesis_with(test_config()).unwrap();
        let err = chain
            .append_by_stake("by B", &Address::from("B"), &staking)
            .unwrap_err();
        assert!(matches!(
            err,
            ConsensusError::Validation(ValidationError::ValidatorIneligible { .. })
        ));
    }

    #[test]
    fn append_from_pool_includes_coinbase_and_queued_txs() {
        let mut pool = QueuedTxPool::new();
        pool.push(Transaction::coinbase(b"alice", b""));

        let mut chain = Chain::genesis_with(test_config())
            .unwrap()
            .with_reward_key(Some(b"miner".to_vec()));
        let block = chain.append_from_pool("with txs", &mut pool).unwrap();

        assert_eq!(block.txs.len(), 2);
        assert!(pool.is_empty());
        assert_eq!(chain.transactions().count(), 2);
    }

    #[test]
    fn accept_all_validator_still_checks_structure() {
        let cfg = test_config();
        let mut chain =
            Chain::with_parts(cfg, InMemoryBlockStore::new(), AcceptAllValidator).unwrap();
        chain.append("x").unwrap();
        assert!(chain.validate());

        chain.store_mut().block_mut(0).unwrap().timestamp += 1;
        assert!(!chain.validate());
    }

    #[test]
    fn invalid_difficulty_is_rejected_up_front() {
        let err = Chain::genesis_with(ConsensusConfig::with_difficulty(300)).unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidDifficulty(300)));
    }

    #[derive(Clone, Debug)]
    enum Tamper {
        Payload,
        Timestamp,
        Nonce,
        PreviousHash,
    }

    fn tamper_strategy() -> impl Strategy<Value = Tamper> {
        prop_oneof![
            Just(Tamper::Payload),
            Just(Tamper::Timestamp),
            Just(Tamper::Nonce),
            Just(Tamper::PreviousHash),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn any_appended_chain_validates_and_any_non_tip_tamper_is_caught(
            payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..32), 1..5),
            target in any::<prop::sample::Index>(),
            tamper in tamper_strategy(),
        ) {
            let mut chain = Chain::genesis_with(ConsensusConfig::with_difficulty(4)).unwrap();
            for p in &payloads {
                chain.append(p.clone()).unwrap();
            }
            prop_assert!(chain.validate());

            // Non-tip blocks are 0..len-1.
            let index = target.index(chain.len() - 1);
            {
                let b = chain.store_mut().block_mut(index).unwrap();
                match tamper {
                    Tamper::Payload => b.payload.push(0xAA),
                    Tamper::Timestamp => b.timestamp = b.timestamp.wrapping_add(1),
                    Tamper::Nonce => {
                        if let Seal::ProofOfWork { nonce, .. } = &mut b.seal {
                            *nonce = nonce.wrapping_add(1);
                        }
                    }
                    Tamper::PreviousHash => b.previous_hash.0.0[0] ^= 0x80,
                }
            }

            let err = chain.validate_detailed().unwrap_err();
            let kind_ok = matches!(
                err,
                ValidationError::HashMismatch { .. } | ValidationError::LinkageMismatch { .. }
            );
            prop_assert!(kind_ok);
            prop_assert_eq!(err.index(), index);
        }
    }
}
