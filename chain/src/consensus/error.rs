use thiserror::Error;

use crate::types::{Address, BlockHash};

/// Reason a chain failed validation.
///
/// Every variant carries the index of the first offending block. None of
/// these are fatal: the caller decides whether to drop the block, the
/// chain, or resync.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ValidationError {
    /// Stored hash does not match the digest re-derived from the fields.
    #[error("block {index}: stored hash {stored} does not match recomputed {computed}")]
    HashMismatch {
        index: usize,
        stored: BlockHash,
        computed: BlockHash,
    },
    /// Previous-hash does not point at the preceding block (or, for
    /// genesis, at the zero digest).
    #[error("block {index}: previous hash {found} does not link to {expected}")]
    LinkageMismatch {
        index: usize,
        expected: BlockHash,
        found: BlockHash,
    },
    /// Proof-of-work seal whose digest is not below its target.
    #[error("block {index}: hash does not satisfy {difficulty_bits}-bit proof-of-work target")]
    ProofOfWorkUnsatisfied { index: usize, difficulty_bits: u32 },
    /// Stake seal naming a validator that is not currently eligible.
    #[error("block {index}: validator {validator} is not an eligible staker")]
    ValidatorIneligible { index: usize, validator: Address },
    /// Stake seal offered as the new tip by a staker other than the one
    /// currently selected.
    #[error("block {index}: validator {validator} is not the selected validator")]
    ValidatorNotSelected { index: usize, validator: Address },
}

impl ValidationError {
    /// Index of the offending block.
    pub fn index(&self) -> usize {
        match self {
            ValidationError::HashMismatch { index, .. }
            | ValidationError::LinkageMismatch { index, .. }
            | ValidationError::ProofOfWorkUnsatisfied { index, .. }
            | ValidationError::ValidatorIneligible { index, .. }
            | ValidationError::ValidatorNotSelected { index, .. } => *index,
        }
    }
}

/// Errors raised by the staking manager.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum StakeError {
    #[error("stake amount must be non-negative, got {0}")]
    InvalidAmount(i64),
    #[error("no stakers registered")]
    NoStakers,
    #[error("stake of {0} would overflow")]
    Overflow(Address),
    #[error("{claimed} is not the selected validator (selected: {selected})")]
    NotSelected { claimed: Address, selected: Address },
}

/// High-level errors that can occur in the consensus engine.
#[derive(Debug, Error)]
pub enum ConsensusError {
    /// Underlying validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Staking failure while sealing by stake.
    #[error(transparent)]
    Stake(#[from] StakeError),
    /// Block extends a parent that is no longer the tip.
    #[error("stale tip: block extends {parent}, current tip is {tip}")]
    StaleTip { parent: BlockHash, tip: BlockHash },
    #[error("difficulty of {0} bits exceeds the 256-bit digest")]
    InvalidDifficulty(u32),
    /// Mining was abandoned before a nonce was found.
    #[error("mining cancelled")]
    MiningCancelled,
    /// A concurrent append kept losing races to other writers.
    #[error("append gave up after {0} stale-tip retries")]
    RetriesExhausted(usize),
    /// Catch-all for other issues.
    #[error("consensus error: {0}")]
    Other(String),
}
