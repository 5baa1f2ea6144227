//! Core domain types used by the chain
//!
//! This module defines strongly-typed digests, block and transaction
//! structures, and the seal policies a block can carry. The goal is to
//! avoid "naked" byte buffers in public APIs and instead use
//! domain-specific newtypes.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Block structures, seal policies and the canonical block digest.
pub mod block;
/// UTXO-style transactions and the coinbase reward.
pub mod tx;

pub use block::{Block, BlockCandidate, BlockHash, Seal, SealKind};
pub use tx::{COINBASE_REWARD, Transaction, TxId, TxInput, TxOutput, hash_pub_key};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (SHA-256).
///
/// This type is used as the backing representation for all fixed-size
/// digests in the chain (block hashes, transaction ids, public key
/// hashes). It is always exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// The all-zero digest. Genesis blocks point at this as their parent.
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    /// Computes a new [`Hash256`] as the SHA-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        Hash256(Sha256::digest(data).into())
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Parses a hex string holding exactly [`HASH_LEN`] bytes.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; HASH_LEN] = bytes.try_into().ok()?;
        Some(Hash256(arr))
    }

    /// Returns `true` for the all-zero digest.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Participant address used by the stake table and stake seals.
///
/// Addresses are opaque string identifiers; the chain never interprets
/// them beyond equality.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(s: impl Into<String>) -> Self {
        Address(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input_matches_known_vector() {
        let h = Hash256::compute(b"");
        assert_eq!(
            h.to_string(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hex_parsing_rejects_wrong_length() {
        assert!(Hash256::from_hex("abcd").is_none());
        assert!(Hash256::from_hex("zz").is_none());

        let h = Hash256::compute(b"payload");
        assert_eq!(Hash256::from_hex(&h.to_string()), Some(h));
    }

    #[test]
    fn zero_digest_is_zero() {
        assert!(Hash256::ZERO.is_zero());
        assert!(!Hash256::compute(b"x").is_zero());
    }
}
