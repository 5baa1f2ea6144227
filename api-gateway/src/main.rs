// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `chain` crate:
//!
//! - `GET /health`
//! - `GET /chain`, `GET /chain/validate`
//! - `POST /blocks`
//! - `POST /transactions`
//! - `GET /stakes`, `POST /stakes`, `GET /stakes/validator`
//! - `GET /peers`
//!
//! It embeds an in-memory chain with stake sealing enabled, a gossip node
//! that imports and relays peer blocks, and a Prometheus metrics exporter
//! on `/metrics`.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::{signal, sync::mpsc};
use tracing_subscriber::EnvFilter;

use chain::gossip::spawn_relay;
use chain::{
    Chain, ChainConfig, ChainMessageHandler, GossipNode, MetricsRegistry, QueuedTxPool,
    SharedChain, StakingManager, run_prometheus_http_server,
};
use config::ApiConfig;
use routes::{blocks, health, ledger, peers, stakes, transactions};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("api_gateway=info,chain=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env()?;
    let chain_cfg = ChainConfig::from_env()?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if chain_cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = chain_cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
    }

    // ---------------------------
    // Chain + staking
    // ---------------------------

    let staking = Arc::new(StakingManager::new());
    let chain = {
        let consensus = chain_cfg.consensus.clone();
        let staking = staking.clone();
        let consensus_metrics = metrics.consensus.clone();
        let reward_pub_key = chain_cfg.reward_pub_key.clone();
        tokio::task::spawn_blocking(move || {
            Chain::genesis_with(consensus).map(|c| {
                c.with_staking(staking)
                    .with_metrics(consensus_metrics)
                    .with_reward_key(reward_pub_key)
            })
        })
        .await
        .map_err(|e| format!("genesis task failed: {e}"))?
        .map_err(|e| format!("failed to create genesis block: {e}"))?
    };
    let chain = SharedChain::new(chain);

    // ---------------------------
    // Gossip node + relay
    // ---------------------------

    let tx_pool = Arc::new(parking_lot::Mutex::new(QueuedTxPool::new()));
    let (relay_tx, relay_rx) = mpsc::channel(64);
    let handler = ChainMessageHandler::new(chain.clone(), tx_pool.clone()).with_relay(relay_tx);
    let node = Arc::new(
        GossipNode::new(chain_cfg.gossip.clone(), handler).with_metrics(metrics.gossip.clone()),
    );
    node.start(&chain_cfg.gossip.listen_addr)
        .await
        .map_err(|e| e.to_string())?;
    let _relay = spawn_relay(node.clone(), relay_rx);

    // ---------------------------
    // Shared state
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        chain,
        staking,
        tx_pool,
        node: node.clone(),
    });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/chain", get(ledger::list_blocks))
        .route("/chain/validate", get(ledger::validate))
        .route("/blocks", post(blocks::append_block))
        .route("/transactions", post(transactions::submit_transaction))
        .route("/stakes", get(stakes::list_stakes).post(stakes::add_stake))
        .route("/stakes/validator", get(stakes::selected_validator))
        .route("/peers", get(peers::list_peers))
        .with_state(app_state);

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    node.stop();
    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
