use std::time::Duration;

/// Gossip node parameters.
#[derive(Clone, Debug)]
pub struct GossipConfig {
    /// Address the node listens on, e.g. `"127.0.0.1:3000"`.
    pub listen_addr: String,
    /// Known peer addresses; broadcasts go to each of them.
    pub peers: Vec<String>,
    /// Maximum number of inbound connections handled at once.
    pub max_connections: usize,
    /// Deadline for connecting to a peer and for each frame read or write.
    pub io_timeout: Duration,
    /// Largest accepted frame body, in bytes.
    pub max_message_bytes: usize,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:3000".to_string(),
            peers: Vec::new(),
            max_connections: 256,
            io_timeout: Duration::from_secs(10),
            max_message_bytes: 4 * 1024 * 1024,
        }
    }
}
