// src/main.rs
//
// Demo node that wires up the chain library:
//
// - in-memory chain mined at the configured difficulty
// - Prometheus metrics exporter on /metrics
// - gossip node that imports peer blocks and relays new ones
// - mines "Block 1 Data" and "Block 2 Data", validates, then serves
//   peers until Ctrl-C.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use chain::gossip::spawn_relay;
use chain::{
    Chain, ChainConfig, ChainMessageHandler, GossipNode, MetricsRegistry, PeerMessage,
    QueuedTxPool, SharedChain, run_prometheus_http_server,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chain=info")),
        )
        .init();

    if let Err(err) = run_node().await {
        tracing::error!("fatal error: {err}");
        std::process::exit(1);
    }
}

async fn run_node() -> Result<(), String> {
    let cfg = ChainConfig::from_env()?;

    // ---------------------------
    // Metrics registry + exporter
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
    }

    // ---------------------------
    // Chain
    // ---------------------------

    let consensus = cfg.consensus.clone();
    let metrics_clone = metrics.clone();
    let reward_pub_key = cfg.reward_pub_key.clone();
    let chain = tokio::task::spawn_blocking(move || {
        Chain::genesis_with(consensus).map(|c| {
            c.with_metrics(metrics_clone.consensus.clone())
                .with_reward_key(reward_pub_key)
        })
    })
    .await
    .map_err(|e| format!("genesis task failed: {e}"))?
    .map_err(|e| format!("failed to create genesis block: {e}"))?;
    let chain = SharedChain::new(chain);

    // ---------------------------
    // Gossip node + relay
    // ---------------------------

    let tx_pool = Arc::new(parking_lot::Mutex::new(QueuedTxPool::new()));
    let (relay_tx, relay_rx) = mpsc::channel(64);
    let handler = ChainMessageHandler::new(chain.clone(), tx_pool.clone()).with_relay(relay_tx);
    let node = Arc::new(
        GossipNode::new(cfg.gossip.clone(), handler).with_metrics(metrics.gossip.clone()),
    );
    node.start(&cfg.gossip.listen_addr)
        .await
        .map_err(|e| e.to_string())?;
    let _relay = spawn_relay(node.clone(), relay_rx);

    // ---------------------------
    // Demo appends
    // ---------------------------

    for payload in ["Block 1 Data", "Block 2 Data"] {
        let (_, block) = chain
            .append_from_pool(payload.as_bytes().to_vec(), &tx_pool)
            .await
            .map_err(|e| format!("failed to append {payload:?}: {e}"))?;

        println!("Prev. hash: {}", block.previous_hash);
        println!("Data: {}", String::from_utf8_lossy(&block.payload));
        println!("Hash: {}", block.hash);
        println!();

        let msg = PeerMessage::block(&block).map_err(|e| e.to_string())?;
        match node.broadcast(&msg).await {
            Ok(report) if !report.all_delivered() => {
                tracing::warn!(failed = ?report.failed, "some peers missed block");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "failed to broadcast block"),
        }
    }

    match chain.validate_detailed().await {
        Ok(()) => println!("chain valid: true ({} blocks)", chain.len().await),
        Err(e) => println!("chain valid: false ({e})"),
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {e}"))?;
    node.stop();
    Ok(())
}
