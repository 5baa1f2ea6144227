//! Dispatch from decoded messages to application callbacks.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::consensus::{ConsensusError, QueuedTxPool, SharedChain};
use crate::types::{Block, Transaction};

use super::message::{MessageKind, PeerMessage};

/// Application callbacks for inbound gossip.
///
/// The node only decodes and routes. What a block or transaction means is
/// up to the implementation.
#[async_trait]
pub trait MessageHandler: Send + Sync + 'static {
    async fn on_block(&self, payload: Vec<u8>);
    async fn on_transaction(&self, payload: Vec<u8>);
}

/// Routes `msg` to the matching callback.
pub async fn dispatch<H>(handler: &H, msg: PeerMessage)
where
    H: MessageHandler + ?Sized,
{
    match msg.kind {
        MessageKind::Block => handler.on_block(msg.payload).await,
        MessageKind::Transaction => handler.on_transaction(msg.payload).await,
    }
}

/// Handler that imports blocks into a [`SharedChain`] and queues
/// transactions.
///
/// With a relay attached, every block or transaction that is new to this
/// node is forwarded for rebroadcast. Already-known items are not, so
/// relaying stops once every peer has seen a message.
#[derive(Clone)]
pub struct ChainMessageHandler {
    chain: SharedChain,
    tx_pool: Arc<parking_lot::Mutex<QueuedTxPool>>,
    relay: Option<mpsc::Sender<PeerMessage>>,
}

impl ChainMessageHandler {
    pub fn new(chain: SharedChain, tx_pool: Arc<parking_lot::Mutex<QueuedTxPool>>) -> Self {
        Self {
            chain,
            tx_pool,
            relay: None,
        }
    }

    pub fn with_relay(mut self, relay: mpsc::Sender<PeerMessage>) -> Self {
        self.relay = Some(relay);
        self
    }

    async fn forward(&self, kind: MessageKind, payload: Vec<u8>) {
        if let Some(relay) = &self.relay {
            if relay.send(PeerMessage::new(kind, payload)).await.is_err() {
                tracing::debug!(%kind, "relay channel closed, not rebroadcasting");
            }
        }
    }
}

#[async_trait]
impl MessageHandler for ChainMessageHandler {
    async fn on_block(&self, payload: Vec<u8>) {
        let block = match Block::from_canonical_bytes(&payload) {
            Ok(block) => block,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable block payload");
                return;
            }
        };

        match self.chain.import(block).await {
            Ok(hash) => {
                tracing::info!(%hash, "imported block from peer");
                self.forward(MessageKind::Block, payload).await;
            }
            Err(ConsensusError::StaleTip { parent, tip }) => {
                tracing::debug!(%parent, %tip, "ignoring block that does not extend our tip");
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejected block from peer");
            }
        }
    }

    async fn on_transaction(&self, payload: Vec<u8>) {
        let tx = match Transaction::from_bytes(&payload) {
            Ok(tx) => tx,
            Err(e) => {
                tracing::warn!(error = %e, "discarding undecodable transaction payload");
                return;
            }
        };
        if !tx.verify_id() {
            tracing::warn!(id = %tx.id, "rejected transaction with mismatched id");
            return;
        }

        let id = tx.id;
        let added = self.tx_pool.lock().push(tx);
        if added {
            tracing::debug!(%id, "queued transaction from peer");
            self.forward(MessageKind::Transaction, payload).await;
        }
    }
}
