//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and the strongly-typed consensus and gossip metrics, and an
//! async HTTP exporter that serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header::{self, HeaderValue},
    server::conn::http1, service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};

use crate::consensus::MiningOutcome;

/// Mining and import metrics.
///
/// Registered into a [`Registry`] and updated by
/// [`crate::consensus::Chain`] and [`crate::consensus::SharedChain`].
#[derive(Clone, Debug)]
pub struct ConsensusMetrics {
    /// Wall time of each nonce search, in seconds.
    pub mining_seconds: Histogram,
    /// Blocks sealed by proof-of-work on this node.
    pub blocks_mined: IntCounter,
    /// Digests computed while mining.
    pub hash_attempts: IntCounter,
    /// Blocks appended via `try_extend`, local or remote.
    pub blocks_imported: IntCounter,
    /// Blocks refused by `try_extend` (stale, tampered or badly sealed).
    pub blocks_rejected: IntCounter,
}

impl ConsensusMetrics {
    /// Registers consensus metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let mining_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "consensus_mining_seconds",
                "Time spent searching for a nonce per block in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ]),
        )?;
        registry.register(Box::new(mining_seconds.clone()))?;

        let blocks_mined = IntCounter::with_opts(Opts::new(
            "consensus_blocks_mined",
            "Total number of blocks sealed by proof-of-work on this node",
        ))?;
        registry.register(Box::new(blocks_mined.clone()))?;

        let hash_attempts = IntCounter::with_opts(Opts::new(
            "consensus_hash_attempts",
            "Total number of block digests computed while mining",
        ))?;
        registry.register(Box::new(hash_attempts.clone()))?;

        let blocks_imported = IntCounter::with_opts(Opts::new(
            "consensus_blocks_imported",
            "Total number of blocks appended to the chain",
        ))?;
        registry.register(Box::new(blocks_imported.clone()))?;

        let blocks_rejected = IntCounter::with_opts(Opts::new(
            "consensus_blocks_rejected",
            "Total number of blocks refused when extending the chain",
        ))?;
        registry.register(Box::new(blocks_rejected.clone()))?;

        Ok(Self {
            mining_seconds,
            blocks_mined,
            hash_attempts,
            blocks_imported,
            blocks_rejected,
        })
    }

    /// Records the outcome of one nonce search.
    pub fn record_mining(&self, outcome: &MiningOutcome, elapsed: Duration) {
        self.mining_seconds.observe(elapsed.as_secs_f64());
        match outcome {
            MiningOutcome::Sealed { attempts, .. } => {
                self.blocks_mined.inc();
                self.hash_attempts.inc_by(*attempts);
            }
            MiningOutcome::Cancelled { attempts } => self.hash_attempts.inc_by(*attempts),
            MiningOutcome::Exhausted => {}
        }
    }
}

/// Peer gossip metrics.
#[derive(Clone)]
pub struct GossipMetrics {
    /// Frames decoded and dispatched to the handler.
    pub messages_received: IntCounter,
    /// Inbound frames that failed to decode.
    pub decode_failures: IntCounter,
    /// Peers that could not be reached during a broadcast.
    pub broadcast_failures: IntCounter,
}

impl GossipMetrics {
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let messages_received = IntCounter::with_opts(Opts::new(
            "gossip_messages_received",
            "Total number of peer messages decoded and dispatched",
        ))?;
        registry.register(Box::new(messages_received.clone()))?;

        let decode_failures = IntCounter::with_opts(Opts::new(
            "gossip_decode_failures",
            "Total number of inbound frames that failed to decode",
        ))?;
        registry.register(Box::new(decode_failures.clone()))?;

        let broadcast_failures = IntCounter::with_opts(Opts::new(
            "gossip_broadcast_failures",
            "Total number of peer deliveries that failed during broadcast",
        ))?;
        registry.register(Box::new(broadcast_failures.clone()))?;

        Ok(Self {
            messages_received,
            decode_failures,
            broadcast_failures,
        })
    }
}

/// Wrapper around a Prometheus registry and all node metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub consensus: ConsensusMetrics,
    pub gossip: GossipMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("chain".to_string()), None)?;
        let consensus = ConsensusMetrics::register(&registry)?;
        let gossip = GossipMetrics::register(&registry)?;
        Ok(Self {
            registry,
            consensus,
            gossip,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode Prometheus metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving Prometheus metrics");

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                tracing::debug!(error = %err, "prometheus HTTP connection error");
            }
        });
    }
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    Ok(route(req.method(), req.uri().path(), &metrics))
}

fn route(method: &Method, path: &str, metrics: &MetricsRegistry) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => {
            let mut resp = Response::new(Full::new(Bytes::from(metrics.gather_text())));
            resp.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            resp
        }
        _ => {
            let mut resp = Response::new(Full::new(Bytes::from("not found")));
            *resp.status_mut() = StatusCode::NOT_FOUND;
            resp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockCandidate, BlockHash, Seal};
    use prometheus::Registry;

    #[test]
    fn consensus_metrics_register_and_record() {
        let registry = Registry::new();
        let metrics = ConsensusMetrics::register(&registry).expect("register metrics");

        let block = BlockCandidate::new(BlockHash::ZERO, b"x".to_vec(), 0).seal(
            Seal::ProofOfWork {
                nonce: 3,
                difficulty_bits: 0,
            },
        );
        metrics.record_mining(&MiningOutcome::Sealed { block, attempts: 4 }, Duration::from_millis(2));
        metrics.record_mining(&MiningOutcome::Cancelled { attempts: 6 }, Duration::from_millis(1));

        assert_eq!(metrics.blocks_mined.get(), 1);
        assert_eq!(metrics.hash_attempts.get(), 10);
        assert_eq!(metrics.mining_seconds.get_sample_count(), 2);
        assert!(!registry.gather().is_empty());
    }

    #[test]
    fn registering_twice_into_one_registry_fails() {
        let registry = Registry::new();
        GossipMetrics::register(&registry).expect("first registration");
        assert!(GossipMetrics::register(&registry).is_err());
    }

    #[test]
    fn metrics_registry_gather_text_works() {
        let registry = MetricsRegistry::new().expect("create metrics registry");
        registry.consensus.blocks_imported.inc();
        registry.gossip.decode_failures.inc();
        let text = registry.gather_text();
        assert!(text.contains("chain_consensus_blocks_imported"));
        assert!(text.contains("chain_gossip_decode_failures"));
    }

    #[test]
    fn unknown_paths_are_not_found() {
        let registry = MetricsRegistry::new().unwrap();
        assert_eq!(
            route(&Method::GET, "/nope", &registry).status(),
            StatusCode::NOT_FOUND
        );
        let ok = route(&Method::GET, "/metrics", &registry);
        assert_eq!(ok.status(), StatusCode::OK);
        assert_eq!(
            ok.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; version=0.0.4"
        );
    }
}
