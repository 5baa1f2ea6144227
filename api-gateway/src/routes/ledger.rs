use axum::{Json, extract::State};
use serde::Serialize;

use crate::routes::BlockSummary;
use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct ChainResponse {
    pub length: usize,
    pub blocks: Vec<BlockSummary>,
}

/// `GET /chain`
pub async fn list_blocks(State(state): State<SharedState>) -> Json<ChainResponse> {
    let blocks = state.chain.blocks().await;
    Json(ChainResponse {
        length: blocks.len(),
        blocks: blocks
            .iter()
            .enumerate()
            .map(|(i, b)| BlockSummary::new(i, b))
            .collect(),
    })
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    /// First violation found, if any.
    pub error: Option<String>,
    /// Index of the offending block, if any.
    pub index: Option<usize>,
}

/// `GET /chain/validate`
///
/// Re-derives every hash and seal. An invalid chain is still a `200`; the
/// body says what is wrong.
pub async fn validate(State(state): State<SharedState>) -> Json<ValidateResponse> {
    let resp = match state.chain.validate_detailed().await {
        Ok(()) => ValidateResponse {
            valid: true,
            error: None,
            index: None,
        },
        Err(e) => ValidateResponse {
            valid: false,
            index: Some(e.index()),
            error: Some(e.to_string()),
        },
    };
    Json(resp)
}
