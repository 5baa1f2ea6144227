//! TCP gossip node.
//!
//! `start` binds a listener and spawns an accept loop. Each accepted
//! connection gets its own task which reads one frame, decodes it, hands
//! it to the [`MessageHandler`] and closes. At most `max_connections`
//! connections are handled at once; further peers wait in the listen
//! backlog until a slot frees up.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::timeout;

use crate::metrics::GossipMetrics;

use super::codec::{BincodeCodec, MessageCodec, read_frame, write_frame};
use super::config::GossipConfig;
use super::error::GossipError;
use super::handler::{MessageHandler, dispatch};
use super::message::PeerMessage;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    Stopped,
    Listening { addr: SocketAddr },
}

/// Per-peer outcome of one [`GossipNode::broadcast`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: Vec<String>,
    pub failed: Vec<String>,
}

impl BroadcastReport {
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

struct Listener {
    addr: SocketAddr,
    accept_task: JoinHandle<()>,
}

/// Everything a connection task needs, shared by the accept loop.
struct Inbound<H, C> {
    handler: Arc<H>,
    codec: Arc<C>,
    io_timeout: Duration,
    max_message_bytes: usize,
    metrics: Option<GossipMetrics>,
}

pub struct GossipNode<H, C = BincodeCodec> {
    config: GossipConfig,
    handler: Arc<H>,
    codec: Arc<C>,
    peers: parking_lot::RwLock<Vec<String>>,
    metrics: Option<GossipMetrics>,
    listener: parking_lot::Mutex<Option<Listener>>,
}

impl<H: MessageHandler> GossipNode<H, BincodeCodec> {
    pub fn new(config: GossipConfig, handler: H) -> Self {
        Self::with_codec(config, handler, BincodeCodec)
    }
}

impl<H, C> GossipNode<H, C>
where
    H: MessageHandler,
    C: MessageCodec,
{
    pub fn with_codec(config: GossipConfig, handler: H, codec: C) -> Self {
        let mut peers = Vec::new();
        for peer in &config.peers {
            if !peers.contains(peer) {
                peers.push(peer.clone());
            }
        }
        Self {
            config,
            handler: Arc::new(handler),
            codec: Arc::new(codec),
            peers: parking_lot::RwLock::new(peers),
            metrics: None,
            listener: parking_lot::Mutex::new(None),
        }
    }

    pub fn with_metrics(mut self, metrics: GossipMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &GossipConfig {
        &self.config
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn state(&self) -> NodeState {
        match &*self.listener.lock() {
            Some(l) => NodeState::Listening { addr: l.addr },
            None => NodeState::Stopped,
        }
    }

    /// Binds `addr` and starts accepting connections.
    ///
    /// Returns the bound address, which differs from `addr` when port 0
    /// was requested.
    pub async fn start(&self, addr: &str) -> Result<SocketAddr, GossipError> {
        if let NodeState::Listening { addr } = self.state() {
            return Err(GossipError::AlreadyListening(addr));
        }

        let listener = TcpListener::bind(addr).await.map_err(|source| GossipError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local = listener.local_addr()?;

        let inbound = Arc::new(Inbound {
            handler: self.handler.clone(),
            codec: self.codec.clone(),
            io_timeout: self.config.io_timeout,
            max_message_bytes: self.config.max_message_bytes,
            metrics: self.metrics.clone(),
        });
        let slots = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let accept_task = tokio::spawn(accept_loop(listener, slots, inbound));

        let mut guard = self.listener.lock();
        if let Some(existing) = guard.as_ref() {
            // Lost a race with a concurrent `start`.
            accept_task.abort();
            return Err(GossipError::AlreadyListening(existing.addr));
        }
        *guard = Some(Listener {
            addr: local,
            accept_task,
        });
        drop(guard);

        tracing::info!(addr = %local, "gossip node listening");
        Ok(local)
    }

    /// Stops accepting connections. Connections already being handled run
    /// to completion.
    pub fn stop(&self) {
        if let Some(l) = self.listener.lock().take() {
            l.accept_task.abort();
            tracing::info!(addr = %l.addr, "gossip node stopped");
        }
    }

    /// Adds a peer address. Returns `false` if it was already known.
    pub fn add_peer(&self, peer: impl Into<String>) -> bool {
        let peer = peer.into();
        let mut peers = self.peers.write();
        if peers.contains(&peer) {
            return false;
        }
        peers.push(peer);
        true
    }

    pub fn peers(&self) -> Vec<String> {
        self.peers.read().clone()
    }

    /// Sends `msg` to every known peer concurrently.
    ///
    /// Peers that cannot be reached are logged and listed in
    /// [`BroadcastReport::failed`]; they never fail the call. The only
    /// error is a message that cannot be encoded at all.
    pub async fn broadcast(&self, msg: &PeerMessage) -> Result<BroadcastReport, GossipError> {
        let body = Arc::new(self.codec.encode(msg)?);
        let io_timeout = self.config.io_timeout;
        let max_bytes = self.config.max_message_bytes;

        let mut sends = JoinSet::new();
        for peer in self.peers() {
            let body = body.clone();
            sends.spawn(async move {
                let result = send_to(&peer, &body, io_timeout, max_bytes).await;
                (peer, result)
            });
        }

        let mut report = BroadcastReport::default();
        while let Some(joined) = sends.join_next().await {
            match joined {
                Ok((peer, Ok(()))) => report.delivered.push(peer),
                Ok((peer, Err(e))) => {
                    tracing::warn!(%peer, error = %e, kind = %msg.kind, "skipping unreachable peer");
                    if let Some(m) = &self.metrics {
                        m.broadcast_failures.inc();
                    }
                    report.failed.push(peer);
                }
                Err(e) => tracing::warn!(error = %e, "broadcast task failed"),
            }
        }

        tracing::debug!(
            kind = %msg.kind,
            delivered = report.delivered.len(),
            failed = report.failed.len(),
            "broadcast finished"
        );
        Ok(report)
    }
}

impl<H, C> Drop for GossipNode<H, C> {
    fn drop(&mut self) {
        if let Some(l) = self.listener.get_mut().take() {
            l.accept_task.abort();
        }
    }
}

/// Broadcasts every message received on `rx` until the channel closes.
pub fn spawn_relay<H, C>(node: Arc<GossipNode<H, C>>, mut rx: mpsc::Receiver<PeerMessage>) -> JoinHandle<()>
where
    H: MessageHandler,
    C: MessageCodec,
{
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = node.broadcast(&msg).await {
                tracing::warn!(error = %e, "failed to relay message");
            }
        }
    })
}

async fn accept_loop<H, C>(listener: TcpListener, slots: Arc<Semaphore>, inbound: Arc<Inbound<H, C>>)
where
    H: MessageHandler,
    C: MessageCodec,
{
    loop {
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!(error = %e, "failed to accept peer connection");
                continue;
            }
        };

        let inbound = inbound.clone();
        tokio::spawn(async move {
            let _permit = permit;
            inbound.handle_connection(stream, peer).await;
        });
    }
}

impl<H, C> Inbound<H, C>
where
    H: MessageHandler,
    C: MessageCodec,
{
    async fn handle_connection(&self, mut stream: TcpStream, peer: SocketAddr) {
        let frame = match timeout(self.io_timeout, read_frame(&mut stream, self.max_message_bytes)).await
        {
            Ok(Ok(frame)) => frame,
            Ok(Err(e)) => {
                self.count_decode_failure(&e);
                tracing::warn!(%peer, error = %e, "dropping peer connection");
                return;
            }
            Err(_) => {
                let e = GossipError::Timeout(self.io_timeout);
                tracing::warn!(%peer, error = %e, "dropping peer connection");
                return;
            }
        };

        let msg = match self.codec.decode(&frame) {
            Ok(msg) => msg,
            Err(e) => {
                self.count_decode_failure(&e);
                tracing::warn!(%peer, error = %e, "dropping malformed peer message");
                return;
            }
        };

        if let Some(m) = &self.metrics {
            m.messages_received.inc();
        }
        tracing::debug!(%peer, kind = %msg.kind, bytes = msg.payload.len(), "received peer message");
        dispatch(&*self.handler, msg).await;
    }

    fn count_decode_failure(&self, e: &GossipError) {
        if let (GossipError::Decode(_), Some(m)) = (e, &self.metrics) {
            m.decode_failures.inc();
        }
    }
}

async fn send_to(
    peer: &str,
    body: &[u8],
    io_timeout: Duration,
    max_bytes: usize,
) -> Result<(), GossipError> {
    let mut stream = match timeout(io_timeout, TcpStream::connect(peer)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            return Err(GossipError::Dial {
                peer: peer.to_string(),
                reason: e.to_string(),
            });
        }
        Err(_) => {
            return Err(GossipError::Dial {
                peer: peer.to_string(),
                reason: format!("connect timed out after {io_timeout:?}"),
            });
        }
    };

    // One deadline covers the frame and the close handshake.
    timeout(io_timeout, async {
        write_frame(&mut stream, body, max_bytes).await?;
        stream.shutdown().await?;
        Ok::<(), GossipError>(())
    })
    .await
    .map_err(|_| GossipError::Timeout(io_timeout))?
}
