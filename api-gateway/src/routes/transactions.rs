use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::{PeerMessage, Transaction};

use crate::routes::{Announcement, ApiError, bad_request};
use crate::state::SharedState;

/// Request body for `POST /transactions`.
///
/// Mints a coinbase paying `recipient_pub_key_hex`. Ordinary transfers need
/// signatures and UTXO tracking, which this node does not do.
///
/// `memo` ends up in the coinbase input and so in the id. Without one the
/// node stamps each request uniquely; resubmitting the same memo for the
/// same key is reported as a duplicate.
#[derive(Debug, Deserialize)]
pub struct SubmitTransactionRequest {
    pub recipient_pub_key_hex: String,
    #[serde(default)]
    pub memo: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitTransactionResponse {
    pub status: &'static str,
    pub id: String,
    pub broadcast: Announcement,
}

/// `POST /transactions`
pub async fn submit_transaction(
    State(state): State<SharedState>,
    Json(body): Json<SubmitTransactionRequest>,
) -> Result<(StatusCode, Json<SubmitTransactionResponse>), ApiError> {
    let pub_key = hex::decode(body.recipient_pub_key_hex.trim())
        .map_err(|_| bad_request("invalid hex encoding"))?;
    if pub_key.is_empty() {
        return Err(bad_request("recipient public key must not be empty"));
    }

    let tx = Transaction::coinbase(&pub_key, &coinbase_data(body.memo));
    let id = tx.id;
    let msg = PeerMessage::transaction(&tx)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let added = state.tx_pool.lock().push(tx);
    if !added {
        return Ok((
            StatusCode::OK,
            Json(SubmitTransactionResponse {
                status: "duplicate",
                id: id.to_string(),
                broadcast: Announcement {
                    delivered: Vec::new(),
                    failed: Vec::new(),
                },
            }),
        ));
    }

    let report = state.announce(&msg).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitTransactionResponse {
            status: "queued",
            id: id.to_string(),
            broadcast: report.into(),
        }),
    ))
}

static SUBMISSIONS: AtomicU64 = AtomicU64::new(0);

/// Input bytes for a submitted coinbase: the memo if given, otherwise the
/// wall-clock time in nanoseconds followed by a per-process sequence number.
fn coinbase_data(memo: Option<String>) -> Vec<u8> {
    if let Some(memo) = memo {
        return memo.into_bytes();
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let seq = SUBMISSIONS.fetch_add(1, Ordering::Relaxed);

    let mut data = nanos.to_be_bytes().to_vec();
    data.extend_from_slice(&seq.to_be_bytes());
    data
}
