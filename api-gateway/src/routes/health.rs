use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::state::SharedState;

/// Liveness plus the current chain height.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub blocks: usize,
    pub tip: Option<String>,
}

/// `GET /health`
pub async fn health(State(state): State<SharedState>) -> (StatusCode, Json<HealthResponse>) {
    let tip = state.chain.tip().await.map(|b| b.hash.to_string());
    let blocks = state.chain.len().await;
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            blocks,
            tip,
        }),
    )
}
