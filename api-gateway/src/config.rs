//! API gateway configuration.
//!
//! This only configures the HTTP listen address. The underlying chain
//! configuration comes from `chain::ChainConfig::from_env()`.

use std::net::SocketAddr;

/// Configuration for the API gateway HTTP server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        // Bind to all interfaces so a container port mapping is reachable.
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
        }
    }
}

impl ApiConfig {
    /// Defaults overridden by `API_LISTEN_ADDR`.
    pub fn from_env() -> Result<Self, String> {
        let mut cfg = Self::default();
        if let Ok(v) = std::env::var("API_LISTEN_ADDR") {
            cfg.listen_addr = v
                .trim()
                .parse()
                .map_err(|e| format!("invalid API_LISTEN_ADDR {v:?}: {e}"))?;
        }
        Ok(cfg)
    }
}
