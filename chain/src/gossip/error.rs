use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the gossip layer.
///
/// Only [`GossipError::Bind`] is fatal to a node. Decode failures drop the
/// offending connection and dial failures skip the offending peer.
#[derive(Debug, Error)]
pub enum GossipError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("node is already listening on {0}")]
    AlreadyListening(SocketAddr),

    #[error("malformed peer message: {0}")]
    Decode(String),

    #[error("failed to encode peer message: {0}")]
    Encode(String),

    #[error("failed to reach peer {peer}: {reason}")]
    Dial { peer: String, reason: String },

    #[error("peer i/o timed out after {0:?}")]
    Timeout(Duration),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
