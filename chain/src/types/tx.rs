// chain/src/types/tx.rs

//! Transaction types.
//!
//! Transactions follow a minimal UTXO shape: inputs reference outputs of
//! earlier transactions and carry an unlock proof, outputs lock a value to
//! the hash of a recipient public key. A coinbase transaction has a single
//! synthetic input and mints [`COINBASE_REWARD`]; the input carries
//! caller-chosen bytes so that two rewards to one key get distinct ids.
//!
//! Signing and wallet handling live outside this crate; the chain only
//! carries the bytes through.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Hash256;

/// Value minted by a coinbase transaction.
pub const COINBASE_REWARD: u64 = 100;

/// Transaction identifier: SHA-256 over the encoded inputs and outputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TxId(pub Hash256);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Hash of a recipient public key, as locked into outputs.
pub fn hash_pub_key(pub_key: &[u8]) -> Hash256 {
    Hash256::compute(pub_key)
}

/// Reference to a prior output plus the proof unlocking it.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxInput {
    /// Transaction whose output is being spent. `None` for coinbase inputs.
    pub prev_tx: Option<TxId>,
    /// Index of the spent output within `prev_tx`.
    pub output_index: Option<u32>,
    /// Unlock proof over the spending transaction.
    pub signature: Vec<u8>,
    /// Public key whose hash must match the spent output.
    pub pub_key: Vec<u8>,
}

impl TxInput {
    /// Synthetic input used by coinbase transactions. There is nothing to
    /// unlock, so `data` travels in the signature slot.
    pub fn coinbase(data: Vec<u8>) -> Self {
        Self {
            prev_tx: None,
            output_index: None,
            signature: data,
            pub_key: Vec::new(),
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_tx.is_none()
    }
}

/// Value locked to a public key hash.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub pub_key_hash: Hash256,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Builds a transaction and derives its id.
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let id = Self::compute_id(&inputs, &outputs);
        Self {
            id,
            inputs,
            outputs,
        }
    }

    /// Mints [`COINBASE_REWARD`] to `recipient_pub_key`.
    ///
    /// `data` is hashed into the id, so it should differ per reward (the
    /// proposer uses the parent block hash).
    pub fn coinbase(recipient_pub_key: &[u8], data: &[u8]) -> Self {
        let output = TxOutput {
            value: COINBASE_REWARD,
            pub_key_hash: hash_pub_key(recipient_pub_key),
        };
        Self::new(vec![TxInput::coinbase(data.to_vec())], vec![output])
    }

    /// Derives the id from inputs and outputs only, never the id field.
    ///
    /// The preimage is the bincode-2 `standard()` encoding of
    /// `(inputs, outputs)`.
    pub fn compute_id(inputs: &[TxInput], outputs: &[TxOutput]) -> TxId {
        // Plain data structs; encoding into a Vec cannot fail.
        let bytes = bincode::serde::encode_to_vec((inputs, outputs), bincode::config::standard())
            .unwrap_or_default();
        TxId(Hash256::compute(&bytes))
    }

    /// Returns `true` if the stored id matches the re-derived one.
    pub fn verify_id(&self) -> bool {
        Self::compute_id(&self.inputs, &self.outputs) == self.id
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Sum of all output values, saturating on overflow.
    pub fn total_output(&self) -> u64 {
        self.outputs
            .iter()
            .fold(0u64, |acc, out| acc.saturating_add(out.value))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::error::EncodeError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::error::DecodeError> {
        let (tx, _): (Transaction, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())?;
        Ok(tx)
    }
}
