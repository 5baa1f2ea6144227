//! Proof-of-work miner.
//!
//! The target for `d` difficulty bits is `2^(256 - d)`; a digest,
//! read as a big-endian 256-bit unsigned integer, must be strictly below
//! it. Expected work is about `2^d` attempts, and there is no upper bound
//! on the search other than the 64-bit nonce space, so callers running
//! the miner off the async runtime should hand it a [`CancelFlag`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use primitive_types::U256;

use crate::types::{Block, BlockCandidate, BlockHash, Seal};

use super::config::{ConsensusConfig, MAX_DIFFICULTY_BITS};

/// Returns the 256-bit target for `difficulty_bits`, or `None` when every
/// digest qualifies (`difficulty_bits == 0`, target `2^256`).
pub fn target(difficulty_bits: u32) -> Option<U256> {
    if difficulty_bits == 0 {
        return None;
    }
    let bits = difficulty_bits.min(MAX_DIFFICULTY_BITS);
    Some(U256::one() << (MAX_DIFFICULTY_BITS - bits))
}

/// Returns `true` if `hash` is strictly below the target for
/// `difficulty_bits`.
pub fn meets_target(hash: &BlockHash, difficulty_bits: u32) -> bool {
    match target(difficulty_bits) {
        None => true,
        Some(target) => U256::from_big_endian(hash.as_bytes()) < target,
    }
}

/// Shared cancellation signal for an in-flight mining search.
///
/// Clones observe the same flag, so a node can keep one handle and give
/// another to the mining thread.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Returns `true` if both handles observe the same flag.
    pub fn same_flag(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Result of a nonce search.
#[derive(Debug)]
pub enum MiningOutcome {
    /// A satisfying nonce was found.
    Sealed { block: Block, attempts: u64 },
    /// The cancel flag was raised before a nonce was found.
    Cancelled { attempts: u64 },
    /// Every 64-bit nonce was tried without success.
    Exhausted,
}

impl MiningOutcome {
    pub fn into_block(self) -> Option<Block> {
        match self {
            MiningOutcome::Sealed { block, .. } => Some(block),
            _ => None,
        }
    }
}

/// Single-threaded proof-of-work miner.
#[derive(Clone, Debug)]
pub struct Miner {
    pub difficulty_bits: u32,
    pub cancel_check_interval: u64,
}

impl Miner {
    pub fn new(difficulty_bits: u32) -> Self {
        Self {
            difficulty_bits,
            cancel_check_interval: 1_024,
        }
    }

    pub fn from_config(cfg: &ConsensusConfig) -> Self {
        Self {
            difficulty_bits: cfg.difficulty_bits,
            cancel_check_interval: cfg.cancel_check_interval.max(1),
        }
    }

    /// Seals `candidate` by proof-of-work, or returns `None` if cancelled.
    pub fn mine(&self, candidate: BlockCandidate, cancel: &CancelFlag) -> Option<Block> {
        self.search(candidate, cancel).into_block()
    }

    /// Iterates nonces from 0 upward until the digest meets the target.
    pub fn search(&self, candidate: BlockCandidate, cancel: &CancelFlag) -> MiningOutcome {
        let interval = self.cancel_check_interval.max(1);
        let mut attempts: u64 = 0;

        for nonce in 0..=u64::MAX {
            if nonce % interval == 0 && cancel.is_cancelled() {
                tracing::debug!(attempts, "mining cancelled");
                return MiningOutcome::Cancelled { attempts };
            }

            attempts = attempts.saturating_add(1);
            let hash = candidate.digest_with_nonce(nonce);
            if meets_target(&hash, self.difficulty_bits) {
                tracing::debug!(
                    nonce,
                    attempts,
                    difficulty_bits = self.difficulty_bits,
                    hash = %hash,
                    "mined block"
                );
                let block = candidate.seal(Seal::ProofOfWork {
                    nonce,
                    difficulty_bits: self.difficulty_bits,
                });
                return MiningOutcome::Sealed { block, attempts };
            }
        }

        tracing::warn!(difficulty_bits = self.difficulty_bits, "nonce space exhausted");
        MiningOutcome::Exhausted
    }
}
