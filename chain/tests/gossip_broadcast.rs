//! Two gossip nodes on localhost exchanging blocks.

use std::sync::Arc;
use std::time::Duration;

use chain::{
    Chain, ChainMessageHandler, ConsensusConfig, GossipConfig, GossipNode, PeerMessage,
    QueuedTxPool, SharedChain, Transaction,
};

fn shared_chain() -> SharedChain {
    SharedChain::new(Chain::genesis_with(ConsensusConfig::with_difficulty(6)).unwrap())
}

fn config() -> GossipConfig {
    GossipConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        io_timeout: Duration::from_secs(2),
        ..GossipConfig::default()
    }
}

async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition within deadline");
}

#[tokio::test]
async fn broadcast_reaches_a_live_peer_despite_a_dead_one() {
    // P1: a real node sharing our genesis, so our block extends its tip.
    let local = shared_chain();
    let genesis = local.blocks().await;
    let remote = SharedChain::new(
        Chain::with_parts(
            ConsensusConfig::with_difficulty(6),
            {
                let mut store = chain::InMemoryBlockStore::new();
                for b in genesis {
                    chain::BlockStore::push(&mut store, b);
                }
                store
            },
            chain::SealValidity::new(6),
        )
        .unwrap(),
    );
    let remote_pool = Arc::new(parking_lot::Mutex::new(QueuedTxPool::new()));
    let p1_node = GossipNode::new(
        config(),
        ChainMessageHandler::new(remote.clone(), remote_pool.clone()),
    );
    let p1 = p1_node.start("127.0.0.1:0").await.unwrap().to_string();

    // P2: nothing listens here.
    let p2 = {
        let l = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        l.local_addr().unwrap().to_string()
    };

    let sender = GossipNode::new(
        GossipConfig {
            peers: vec![p1.clone(), p2.clone()],
            ..config()
        },
        ChainMessageHandler::new(
            local.clone(),
            Arc::new(parking_lot::Mutex::new(QueuedTxPool::new())),
        ),
    );

    let (_, block) = local.append(b"announce me".to_vec(), Vec::new()).await.unwrap();
    let report = sender
        .broadcast(&PeerMessage::block(&block).unwrap())
        .await
        .expect("dial failures are not errors");
    assert_eq!(report.delivered, vec![p1]);
    assert_eq!(report.failed, vec![p2]);

    wait_until(|| {
        let remote = remote.clone();
        async move { remote.len().await == 2 }
    })
    .await;
    assert_eq!(remote.tip().await.unwrap().hash, block.hash);
    assert!(remote.validate().await);

    let tx = Transaction::coinbase(b"dave", b"");
    let report = sender
        .broadcast(&PeerMessage::transaction(&tx).unwrap())
        .await
        .unwrap();
    assert_eq!(report.delivered.len(), 1);
    wait_until(|| {
        let pool = remote_pool.clone();
        async move { pool.lock().len() == 1 }
    })
    .await;
}
