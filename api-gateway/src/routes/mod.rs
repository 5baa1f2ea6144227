pub mod blocks;
pub mod ledger;
pub mod health;
pub mod peers;
pub mod stakes;
pub mod transactions;

use axum::http::StatusCode;
use serde::Serialize;

use chain::{Block, BroadcastReport, ConsensusError, StakeError, ValidationError};

/// JSON view of a block.
#[derive(Debug, Serialize)]
pub struct BlockSummary {
    pub index: usize,
    pub hash: String,
    pub previous_hash: String,
    pub timestamp: u64,
    /// Payload as UTF-8, lossy.
    pub payload: String,
    pub seal: String,
    pub nonce: u64,
    pub validator: Option<String>,
    pub txs: usize,
}

impl BlockSummary {
    pub fn new(index: usize, block: &Block) -> Self {
        Self {
            index,
            hash: block.hash.to_string(),
            previous_hash: block.previous_hash.to_string(),
            timestamp: block.timestamp,
            payload: String::from_utf8_lossy(&block.payload).into_owned(),
            seal: block.seal.kind().to_string(),
            nonce: block.nonce(),
            validator: block.validator().map(|v| v.to_string()),
            txs: block.txs.len(),
        }
    }
}

/// Which peers a broadcast reached.
#[derive(Debug, Serialize)]
pub struct Announcement {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl From<BroadcastReport> for Announcement {
    fn from(report: BroadcastReport) -> Self {
        Self {
            delivered: report.delivered,
            failed: report.failed,
        }
    }
}

pub type ApiError = (StatusCode, String);

pub fn bad_request(msg: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, msg.into())
}

pub fn stake_error(e: StakeError) -> ApiError {
    let status = match e {
        StakeError::InvalidAmount(_) | StakeError::Overflow(_) => StatusCode::BAD_REQUEST,
        StakeError::NoStakers => StatusCode::NOT_FOUND,
        StakeError::NotSelected { .. } => StatusCode::CONFLICT,
    };
    (status, e.to_string())
}

pub fn consensus_error(e: ConsensusError) -> ApiError {
    match e {
        ConsensusError::Stake(e) => stake_error(e),
        e @ (ConsensusError::StaleTip { .. }
        | ConsensusError::RetriesExhausted(_)
        | ConsensusError::Validation(ValidationError::ValidatorNotSelected { .. })) => {
            (StatusCode::CONFLICT, e.to_string())
        }
        e @ ConsensusError::MiningCancelled => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        e => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chain::{Address, BlockCandidate, BlockHash, Seal};

    #[test]
    fn summary_reports_seal_details() {
        let block = BlockCandidate::new(BlockHash::ZERO, b"hi".to_vec(), 5)
            .seal(Seal::Stake {
                validator: Address::from("B"),
            });
        let summary = BlockSummary::new(3, &block);

        assert_eq!(summary.index, 3);
        assert_eq!(summary.payload, "hi");
        assert_eq!(summary.seal, "stake");
        assert_eq!(summary.nonce, 0);
        assert_eq!(summary.validator.as_deref(), Some("B"));
        assert_eq!(summary.previous_hash, "0".repeat(64));
    }

    #[test]
    fn stake_errors_map_to_client_statuses() {
        assert_eq!(stake_error(StakeError::InvalidAmount(-1)).0, StatusCode::BAD_REQUEST);
        assert_eq!(stake_error(StakeError::NoStakers).0, StatusCode::NOT_FOUND);
        assert_eq!(
            consensus_error(ConsensusError::Stake(StakeError::NotSelected {
                claimed: Address::from("A"),
                selected: Address::from("B"),
            }))
            .0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            consensus_error(ConsensusError::Validation(
                ValidationError::ValidatorNotSelected {
                    index: 1,
                    validator: Address::from("A"),
                }
            ))
            .0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            consensus_error(ConsensusError::InvalidDifficulty(300)).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
