//! Top-level configuration for a chain node.
//!
//! This module aggregates configuration for:
//!
//! - consensus parameters (`ConsensusConfig`),
//! - peer gossip (`GossipConfig`),
//! - metrics exporter (enable flag + listen address),
//! - the optional mining reward key.
//!
//! The goal is to have a single `ChainConfig` struct that higher-level
//! binaries (e.g. `main.rs`) can construct from defaults or environment
//! variables as needed.

use std::net::SocketAddr;

use crate::consensus::ConsensusConfig;
use crate::gossip::GossipConfig;

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 9898)),
        }
    }
}

/// Top-level configuration for a chain node.
#[derive(Clone, Debug, Default)]
pub struct ChainConfig {
    pub consensus: ConsensusConfig,
    pub gossip: GossipConfig,
    pub metrics: MetricsConfig,
    /// Public key paid by the coinbase of locally mined blocks. `None`
    /// mines blocks without a coinbase.
    pub reward_pub_key: Option<Vec<u8>>,
}

impl ChainConfig {
    /// Defaults overridden by `CHAIN_*` environment variables.
    ///
    /// | variable                | field                     |
    /// |-------------------------|---------------------------|
    /// | `CHAIN_DIFFICULTY_BITS` | `consensus.difficulty_bits` |
    /// | `CHAIN_LISTEN_ADDR`     | `gossip.listen_addr`      |
    /// | `CHAIN_PEERS`           | `gossip.peers` (comma separated) |
    /// | `CHAIN_METRICS_ADDR`    | `metrics.listen_addr`     |
    /// | `CHAIN_METRICS_ENABLED` | `metrics.enabled`         |
    /// | `CHAIN_REWARD_PUB_KEY`  | `reward_pub_key` (hex)    |
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ChainConfig::from_env`] but reading from `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut cfg = Self::default();

        if let Some(v) = lookup("CHAIN_DIFFICULTY_BITS") {
            cfg.consensus.difficulty_bits = v
                .trim()
                .parse()
                .map_err(|e| format!("invalid CHAIN_DIFFICULTY_BITS {v:?}: {e}"))?;
        }
        if let Some(v) = lookup("CHAIN_LISTEN_ADDR") {
            cfg.gossip.listen_addr = v.trim().to_string();
        }
        if let Some(v) = lookup("CHAIN_PEERS") {
            cfg.gossip.peers = v
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = lookup("CHAIN_METRICS_ADDR") {
            cfg.metrics.listen_addr = v
                .trim()
                .parse()
                .map_err(|e| format!("invalid CHAIN_METRICS_ADDR {v:?}: {e}"))?;
        }
        if let Some(v) = lookup("CHAIN_METRICS_ENABLED") {
            cfg.metrics.enabled = match v.trim() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" => false,
                other => return Err(format!("invalid CHAIN_METRICS_ENABLED {other:?}")),
            };
        }
        if let Some(v) = lookup("CHAIN_REWARD_PUB_KEY") {
            let key = hex::decode(v.trim())
                .map_err(|e| format!("invalid CHAIN_REWARD_PUB_KEY: {e}"))?;
            cfg.reward_pub_key = Some(key);
        }

        cfg.consensus.validate().map_err(|e| e.to_string())?;
        Ok(cfg)
    }
}
