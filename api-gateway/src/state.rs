//! Shared application state.

use std::sync::Arc;

use chain::{
    ChainMessageHandler, GossipNode, PeerMessage, QueuedTxPool, SharedChain,
    StakingManager,
};

/// Shared state held by the API and background tasks.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via Axum's
/// `State` extractor.
pub struct AppState {
    /// The node's chain; appends mine off-lock.
    pub chain: SharedChain,
    /// Stake table consulted by stake-sealed appends and validation.
    pub staking: Arc<StakingManager>,
    /// Transactions waiting for the next block, fed by HTTP and gossip.
    pub tx_pool: Arc<parking_lot::Mutex<QueuedTxPool>>,
    /// Gossip node used to announce new blocks and transactions.
    pub node: Arc<GossipNode<ChainMessageHandler>>,
}

impl AppState {
    /// Broadcasts `msg`, logging rather than failing on unreachable peers.
    pub async fn announce(&self, msg: &PeerMessage) -> chain::BroadcastReport {
        match self.node.broadcast(msg).await {
            Ok(report) => report,
            Err(e) => {
                tracing::warn!(error = %e, kind = %msg.kind, "failed to broadcast");
                chain::BroadcastReport::default()
            }
        }
    }
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
