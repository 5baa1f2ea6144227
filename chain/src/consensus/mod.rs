//! Consensus: sealing, validation and the chain itself.
//!
//! The layer is split into small pieces so each can be tested alone:
//!
//! - configuration parameters ([`config::ConsensusConfig`]),
//! - proof-of-work targets and the nonce search ([`pow::Miner`]),
//! - stake bookkeeping and validator selection ([`stake::StakingManager`]),
//! - block storage ([`store::BlockStore`]) and seal validation
//!   ([`validator::BlockValidator`]),
//! - candidate construction ([`proposer::Proposer`]),
//! - the chain ([`chain::Chain`]) and its concurrent handle
//!   ([`shared::SharedChain`]).

pub mod chain;
pub mod config;
pub mod error;
pub mod pow;
pub mod proposer;
pub mod shared;
pub mod stake;
pub mod store;
pub mod validator;

pub use chain::{Chain, current_unix_timestamp};
pub use config::{ConsensusConfig, MAX_DIFFICULTY_BITS};
pub use error::{ConsensusError, StakeError, ValidationError};
pub use pow::{CancelFlag, Miner, MiningOutcome, meets_target, target};
pub use proposer::{EmptyTxPool, Proposer, QueuedTxPool, TxPool};
pub use shared::SharedChain;
pub use stake::{StakeTable, StakingManager};
pub use store::BlockStore;
pub use validator::{
    AcceptAllValidator, BlockValidator, ProofOfWorkValidity, SealValidity, StakeValidity,
};
