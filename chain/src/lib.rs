//! Chain library crate.
//!
//! This crate provides the core building blocks for a small
//! proof-of-work blockchain with an optional stake-based sealing policy:
//!
//! - strongly-typed domain types (`types`),
//! - hashing, mining, staking and the chain itself (`consensus`),
//! - an in-memory block store (`storage`),
//! - TCP peer gossip (`gossip`),
//! - Prometheus-based metrics (`metrics`),
//! - and a top-level node configuration (`config`).
//!
//! Higher-level binaries can compose these pieces to build mining nodes,
//! gateways and test harnesses.

pub mod config;
pub mod consensus;
pub mod gossip;
pub mod metrics;
pub mod storage;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ChainConfig, MetricsConfig};

// Re-export "core" consensus types and traits.
pub use consensus::{
    AcceptAllValidator, BlockStore, BlockValidator, CancelFlag, Chain, ConsensusConfig,
    ConsensusError, EmptyTxPool, Miner, MiningOutcome, Proposer, QueuedTxPool, SealValidity,
    SharedChain, StakeError, StakingManager, TxPool, ValidationError, current_unix_timestamp,
};

// Re-export the gossip node and its collaborators.
pub use gossip::{
    BroadcastReport, ChainMessageHandler, GossipConfig, GossipError, GossipNode, MessageHandler,
    MessageKind, NodeState, PeerMessage,
};

// Re-export storage backends.
pub use storage::InMemoryBlockStore;

// Re-export metrics registry and metric groups.
pub use metrics::{ConsensusMetrics, GossipMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;
