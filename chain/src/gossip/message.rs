//! Peer wire messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Block, Transaction};

use super::error::GossipError;

/// What a [`PeerMessage`] payload carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Block,
    Transaction,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Block => f.write_str("block"),
            MessageKind::Transaction => f.write_str("tx"),
        }
    }
}

/// A single gossip message: a kind tag and an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMessage {
    pub kind: MessageKind,
    pub payload: Vec<u8>,
}

impl PeerMessage {
    pub fn new(kind: MessageKind, payload: Vec<u8>) -> Self {
        Self { kind, payload }
    }

    /// Wraps a sealed block in its canonical encoding.
    pub fn block(block: &Block) -> Result<Self, GossipError> {
        let payload = block
            .canonical_bytes()
            .map_err(|e| GossipError::Encode(e.to_string()))?;
        Ok(Self::new(MessageKind::Block, payload))
    }

    pub fn transaction(tx: &Transaction) -> Result<Self, GossipError> {
        let payload = tx
            .to_bytes()
            .map_err(|e| GossipError::Encode(e.to_string()))?;
        Ok(Self::new(MessageKind::Transaction, payload))
    }
}
