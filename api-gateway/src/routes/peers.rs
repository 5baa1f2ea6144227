use axum::{Json, extract::State};
use serde::Serialize;

use chain::NodeState;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
pub struct PeersResponse {
    /// Gossip listen address, or `None` if the node is stopped.
    pub listening: Option<String>,
    pub peers: Vec<String>,
}

/// `GET /peers`
pub async fn list_peers(State(state): State<SharedState>) -> Json<PeersResponse> {
    let listening = match state.node.state() {
        NodeState::Listening { addr } => Some(addr.to_string()),
        NodeState::Stopped => None,
    };
    Json(PeersResponse {
        listening,
        peers: state.node.peers(),
    })
}
