use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::{Address, PeerMessage};

use crate::routes::{Announcement, ApiError, BlockSummary, consensus_error};
use crate::state::SharedState;

/// Request body for `POST /blocks`.
///
/// Without `validator` the block is mined by proof-of-work and carries the
/// queued transactions. With `validator` it is sealed by stake, which only
/// succeeds if that address is the currently selected validator.
#[derive(Debug, Deserialize)]
pub struct AppendBlockRequest {
    pub payload: String,
    #[serde(default)]
    pub validator: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AppendBlockResponse {
    pub block: BlockSummary,
    pub broadcast: Announcement,
}

/// `POST /blocks`
pub async fn append_block(
    State(state): State<SharedState>,
    Json(body): Json<AppendBlockRequest>,
) -> Result<(StatusCode, Json<AppendBlockResponse>), ApiError> {
    let payload = body.payload.into_bytes();

    let (index, block) = match body.validator {
        Some(validator) => state
            .chain
            .append_by_stake(payload, &Address::new(validator), &state.staking)
            .await
            .map_err(consensus_error)?,
        None => state
            .chain
            .append_from_pool(payload, &state.tx_pool)
            .await
            .map_err(consensus_error)?,
    };

    tracing::info!(index, hash = %block.hash, seal = %block.seal.kind(), "appended block via API");

    let msg = PeerMessage::block(&block)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let report = state.announce(&msg).await;

    Ok((
        StatusCode::CREATED,
        Json(AppendBlockResponse {
            block: BlockSummary::new(index, &block),
            broadcast: report.into(),
        }),
    ))
}
