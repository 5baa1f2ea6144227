use super::error::ConsensusError;

/// Largest meaningful difficulty: the target becomes `2^0 = 1`.
pub const MAX_DIFFICULTY_BITS: u32 = 256;

/// Consensus configuration parameters.
///
/// This includes both protocol-level knobs (e.g. proof-of-work difficulty)
/// and implementation-level limits (e.g. append retries).
#[derive(Clone, Debug)]
pub struct ConsensusConfig {
    /// Difficulty for locally mined blocks, genesis included. Expected work
    /// is about `2^difficulty_bits` hash attempts.
    pub difficulty_bits: u32,
    /// Payload of the genesis block.
    pub genesis_payload: Vec<u8>,
    /// Miner polls its cancel flag once per this many nonce attempts.
    pub cancel_check_interval: u64,
    /// How many times a concurrent append re-reads the tip and re-mines
    /// after losing a race before giving up.
    pub max_append_retries: usize,
    /// Soft limit on the number of pool transactions per block.
    pub max_block_txs: usize,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            difficulty_bits: 16,
            genesis_payload: b"Genesis Block".to_vec(),
            cancel_check_interval: 1_024,
            max_append_retries: 8,
            max_block_txs: 10_000,
        }
    }
}

impl ConsensusConfig {
    /// Convenience constructor used by tests and tooling that only care
    /// about difficulty.
    pub fn with_difficulty(difficulty_bits: u32) -> Self {
        Self {
            difficulty_bits,
            ..Self::default()
        }
    }

    /// Rejects parameter combinations the miner cannot honour.
    pub fn validate(&self) -> Result<(), ConsensusError> {
        if self.difficulty_bits > MAX_DIFFICULTY_BITS {
            return Err(ConsensusError::InvalidDifficulty(self.difficulty_bits));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = ConsensusConfig::default();
        assert_eq!(cfg.difficulty_bits, 16);
        assert_eq!(cfg.genesis_payload, b"Genesis Block");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn difficulty_above_256_bits_is_rejected() {
        assert!(ConsensusConfig::with_difficulty(256).validate().is_ok());
        let err = ConsensusConfig::with_difficulty(257).validate().unwrap_err();
        assert!(matches!(err, ConsensusError::InvalidDifficulty(257)));
    }
}
