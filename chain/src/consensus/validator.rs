//! Seal validity predicates used by the chain.
//!
//! Linkage and hash re-derivation are structural and live in
//! [`crate::consensus::chain::Chain::validate_detailed`]. What varies per
//! block is how its seal is checked, so that is the pluggable part.
//!
//! A block offered as the new tip goes through
//! [`BlockValidator::validate_extension`], which may be stricter than the
//! check applied when re-walking blocks already on the chain.

use std::sync::Arc;

use crate::types::{Address, Block, Seal};

use super::error::ValidationError;
use super::pow::meets_target;
use super::stake::StakingManager;

/// Pluggable seal predicate for a block at a given chain index.
///
/// Implementations should be deterministic and side-effect free.
pub trait BlockValidator {
    fn validate(&self, index: usize, block: &Block) -> Result<(), ValidationError>;

    /// Check applied to a block about to become the tip at `index`.
    fn validate_extension(&self, index: usize, block: &Block) -> Result<(), ValidationError> {
        self.validate(index, block)
    }
}

/// A trivial validator that accepts every seal.
///
/// Useful for tests that only exercise linkage and hashing.
pub struct AcceptAllValidator;

impl BlockValidator for AcceptAllValidator {
    fn validate(&self, _index: usize, _block: &Block) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Proof-of-work check: the stored hash must be below the block's target,
/// and the block may not claim fewer bits than `min_difficulty_bits`.
#[derive(Clone, Debug, Default)]
pub struct ProofOfWorkValidity {
    pub min_difficulty_bits: u32,
}

impl ProofOfWorkValidity {
    pub fn new(min_difficulty_bits: u32) -> Self {
        Self {
            min_difficulty_bits,
        }
    }
}

impl BlockValidator for ProofOfWorkValidity {
    fn validate(&self, index: usize, block: &Block) -> Result<(), ValidationError> {
        let Seal::ProofOfWork {
            difficulty_bits, ..
        } = block.seal
        else {
            return Ok(());
        };

        if difficulty_bits < self.min_difficulty_bits || !meets_target(&block.hash, difficulty_bits)
        {
            return Err(ValidationError::ProofOfWorkUnsatisfied {
                index,
                difficulty_bits,
            });
        }
        Ok(())
    }
}

/// Stake check.
///
/// Blocks already on the chain need a validator that still holds positive
/// stake. A new tip must additionally be sealed by the validator the table
/// selects right now.
#[derive(Clone, Debug)]
pub struct StakeValidity {
    staking: Arc<StakingManager>,
}

impl StakeValidity {
    pub fn new(staking: Arc<StakingManager>) -> Self {
        Self { staking }
    }
}

impl BlockValidator for StakeValidity {
    fn validate(&self, index: usize, block: &Block) -> Result<(), ValidationError> {
        match &block.seal {
            Seal::Stake { validator } if !self.staking.is_eligible(validator) => {
                Err(ValidationError::ValidatorIneligible {
                    index,
                    validator: validator.clone(),
                })
            }
            _ => Ok(()),
        }
    }

    fn validate_extension(&self, index: usize, block: &Block) -> Result<(), ValidationError> {
        self.validate(index, block)?;
        match &block.seal {
            Seal::Stake { validator } if !self.staking.is_selected(validator) => {
                Err(ValidationError::ValidatorNotSelected {
                    index,
                    validator: validator.clone(),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Dispatches on the block's seal policy.
///
/// Without a staking manager attached, stake-sealed blocks are rejected:
/// there is no table to check eligibility against.
#[derive(Clone, Debug, Default)]
pub struct SealValidity {
    pub pow: ProofOfWorkValidity,
    pub stake: Option<StakeValidity>,
}

impl SealValidity {
    pub fn new(min_difficulty_bits: u32) -> Self {
        Self {
            pow: ProofOfWorkValidity::new(min_difficulty_bits),
            stake: None,
        }
    }

    pub fn with_staking(mut self, staking: Arc<StakingManager>) -> Self {
        self.stake = Some(StakeValidity::new(staking));
        self
    }
}

impl SealValidity {
    fn stake_policy(
        &self,
        index: usize,
        validator: &Address,
    ) -> Result<&StakeValidity, ValidationError> {
        self.stake
            .as_ref()
            .ok_or_else(|| ValidationError::ValidatorIneligible {
                index,
                validator: validator.clone(),
            })
    }
}

impl BlockValidator for SealValidity {
    fn validate(&self, index: usize, block: &Block) -> Result<(), ValidationError> {
        match &block.seal {
            Seal::ProofOfWork { .. } => self.pow.validate(index, block),
            Seal::Stake { validator } => self
                .stake_policy(index, validator)?
                .validate(index, block),
        }
    }

    fn validate_extension(&self, index: usize, block: &Block) -> Result<(), ValidationError> {
        match &block.seal {
            Seal::ProofOfWork { .. } => self.pow.validate_extension(index, block),
            Seal::Stake { validator } => self
                .stake_policy(index, validator)?
                .validate_extension(index, block),
        }
    }
}
