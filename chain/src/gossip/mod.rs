//! Peer gossip over plain TCP.
//!
//! One message per connection: the sender connects, writes a single
//! length-prefixed frame and closes. The receiver decodes the frame and
//! dispatches it by [`MessageKind`] to a [`MessageHandler`].

pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod node;

pub use codec::{BincodeCodec, MessageCodec};
pub use config::GossipConfig;
pub use error::GossipError;
pub use handler::{ChainMessageHandler, MessageHandler, dispatch};
pub use message::{MessageKind, PeerMessage};
pub use node::{BroadcastReport, GossipNode, NodeState, spawn_relay};
