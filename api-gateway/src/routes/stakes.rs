use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};

use chain::Address;

use crate::routes::{ApiError, bad_request, stake_error};
use crate::state::SharedState;

/// Request body for `POST /stakes`.
#[derive(Debug, Deserialize)]
pub struct AddStakeRequest {
    pub address: String,
    /// Negative amounts are rejected.
    pub amount: i64,
}

#[derive(Debug, Serialize)]
pub struct StakeEntry {
    pub address: String,
    pub stake: u64,
}

/// `POST /stakes`
///
/// Returns the address's accumulated stake.
pub async fn add_stake(
    State(state): State<SharedState>,
    Json(body): Json<AddStakeRequest>,
) -> Result<(StatusCode, Json<StakeEntry>), ApiError> {
    if body.address.trim().is_empty() {
        return Err(bad_request("address must not be empty"));
    }
    let total = state
        .staking
        .add_stake(body.address.clone(), body.amount)
        .map_err(stake_error)?;

    Ok((
        StatusCode::OK,
        Json(StakeEntry {
            address: body.address,
            stake: total,
        }),
    ))
}

/// `GET /stakes`
pub async fn list_stakes(State(state): State<SharedState>) -> Json<Vec<StakeEntry>> {
    Json(
        state
            .staking
            .snapshot()
            .into_iter()
            .map(|(address, stake)| StakeEntry {
                address: address.to_string(),
                stake,
            })
            .collect(),
    )
}

/// `GET /stakes/validator`
pub async fn selected_validator(
    State(state): State<SharedState>,
) -> Result<Json<StakeEntry>, ApiError> {
    let address: Address = state.staking.select_validator().map_err(stake_error)?;
    let stake = state.staking.stake_of(&address).unwrap_or_default();
    Ok(Json(StakeEntry {
        address: address.to_string(),
        stake,
    }))
}
