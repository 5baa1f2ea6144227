//! Metrics and instrumentation for the chain.
//!
//! This module defines Prometheus-compatible metrics for mining, block
//! import and gossip, and a small HTTP exporter that serves `/metrics` in
//! Prometheus text format.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use chain::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! let addr: SocketAddr = "127.0.0.1:9898".parse()?;
//!
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! let chain = Chain::genesis()?.with_metrics(registry.consensus.clone());
//! ```

pub mod prometheus;

pub use prometheus::{ConsensusMetrics, GossipMetrics, MetricsRegistry, run_prometheus_http_server};
