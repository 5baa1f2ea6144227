// chain/src/types/block.rs

//! Block types and hashing.
//!
//! A block starts life as a [`BlockCandidate`]: an unsealed bundle of
//! payload, timestamp, parent link and transactions. Sealing (by
//! proof-of-work or by stake selection) consumes the candidate and yields
//! a [`Block`] whose `hash` field is fixed from then on.
//!
//! The block digest is SHA-256 over a fixed byte layout:
//!
//! ```text
//! previous_hash (32 bytes) || payload (raw) || timestamp (u64 BE) || nonce (u64 BE)
//! ```
//!
//! Integers are always encoded as 8 big-endian bytes so the digest is
//! identical on every machine. Every field except the payload is
//! fixed-width, so the concatenation is unambiguous.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Address, HASH_LEN, Hash256, Transaction};

/// Strongly-typed block hash.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl BlockHash {
    /// Parent hash recorded by genesis blocks.
    pub const ZERO: BlockHash = BlockHash(Hash256::ZERO);

    /// Computes the canonical block digest from its hashed fields.
    pub fn digest(previous: &BlockHash, payload: &[u8], timestamp: u64, nonce: u64) -> Self {
        let mut buf = Vec::with_capacity(HASH_LEN + payload.len() + 16);
        buf.extend_from_slice(previous.0.as_bytes());
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&timestamp.to_be_bytes());
        buf.extend_from_slice(&nonce.to_be_bytes());
        BlockHash(Hash256::compute(&buf))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        self.0.as_bytes()
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// How a block was sealed.
///
/// Every block is sealed by exactly one policy, and validation branches
/// on it per block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Seal {
    /// Sealed by finding a nonce whose digest is below the target for
    /// `difficulty_bits`.
    ProofOfWork { nonce: u64, difficulty_bits: u32 },
    /// Sealed by the validator selected from the stake table. The digest
    /// of a stake-sealed block uses nonce 0.
    Stake { validator: Address },
}

impl Seal {
    /// Nonce fed into the digest for this seal.
    pub fn nonce(&self) -> u64 {
        match self {
            Seal::ProofOfWork { nonce, .. } => *nonce,
            Seal::Stake { .. } => 0,
        }
    }

    pub fn kind(&self) -> SealKind {
        match self {
            Seal::ProofOfWork { .. } => SealKind::ProofOfWork,
            Seal::Stake { .. } => SealKind::Stake,
        }
    }

    /// Validator identity, if this is a stake seal.
    pub fn validator(&self) -> Option<&Address> {
        match self {
            Seal::Stake { validator } => Some(validator),
            Seal::ProofOfWork { .. } => None,
        }
    }
}

/// Discriminant of [`Seal`], handy for logging and API responses.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum SealKind {
    ProofOfWork,
    Stake,
}

impl fmt::Display for SealKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealKind::ProofOfWork => f.write_str("proof-of-work"),
            SealKind::Stake => f.write_str("stake"),
        }
    }
}

/// Unsealed block under construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockCandidate {
    /// Seconds since the Unix epoch.
    pub timestamp: u64,
    /// Opaque application payload.
    pub payload: Vec<u8>,
    /// Hash of the block this candidate extends.
    pub previous_hash: BlockHash,
    /// Transactions carried alongside the payload.
    pub txs: Vec<Transaction>,
}

impl BlockCandidate {
    pub fn new(previous_hash: BlockHash, payload: impl Into<Vec<u8>>, timestamp: u64) -> Self {
        Self {
            timestamp,
            payload: payload.into(),
            previous_hash,
            txs: Vec::new(),
        }
    }

    pub fn with_txs(mut self, txs: Vec<Transaction>) -> Self {
        self.txs = txs;
        self
    }

    /// Digest this candidate would have with the given nonce.
    pub fn digest_with_nonce(&self, nonce: u64) -> BlockHash {
        BlockHash::digest(&self.previous_hash, &self.payload, self.timestamp, nonce)
    }

    /// Consumes the candidate and fixes its hash under `seal`.
    ///
    /// This does not check that the seal is actually satisfied; the miner
    /// and the staking manager are the only intended callers.
    pub fn seal(self, seal: Seal) -> Block {
        let hash = self.digest_with_nonce(seal.nonce());
        Block {
            timestamp: self.timestamp,
            payload: self.payload,
            previous_hash: self.previous_hash,
            hash,
            seal,
            txs: self.txs,
        }
    }
}

/// Sealed block.
///
/// For a block obtained from [`BlockCandidate::seal`],
/// `hash == BlockHash::digest(previous_hash, payload, timestamp, seal.nonce())`.
/// Fields stay public so tooling can inspect (and tests can tamper with)
/// stored blocks; [`Block::recompute_hash`] is what validation trusts.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub timestamp: u64,
    pub payload: Vec<u8>,
    pub previous_hash: BlockHash,
    pub hash: BlockHash,
    pub seal: Seal,
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Re-derives the digest from the block's current field values.
    pub fn recompute_hash(&self) -> BlockHash {
        BlockHash::digest(
            &self.previous_hash,
            &self.payload,
            self.timestamp,
            self.seal.nonce(),
        )
    }

    /// Returns `true` if the stored hash matches the re-derived digest.
    pub fn hash_is_consistent(&self) -> bool {
        self.recompute_hash() == self.hash
    }

    pub fn nonce(&self) -> u64 {
        self.seal.nonce()
    }

    /// Validator identity for stake-sealed blocks.
    pub fn validator(&self) -> Option<&Address> {
        self.seal.validator()
    }

    /// Canonical bincode-2 bytes for this block, used on the wire.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    /// Decodes a block previously produced by [`Block::canonical_bytes`].
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let (block, _): (Block, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(block)
    }
}
