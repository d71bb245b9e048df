mod common;

use anyhow::Result;
use common::*;
use ledger_core::{BlockRecord, Chain};
use ledger_node::{
    protocol::{BLOCKCHAIN_ACCEPTED, BLOCKCHAIN_REJECTED, EXITING, INVALID_JSON},
    Handler, Node, NodeConfig, Reply,
};
use ledger_storage::{Peer, PeerRegistry, SledRegistry};
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::oneshot};

/// Answers every message with something that is not a chain.
struct Garbled;

impl Handler for Garbled {
    fn handle(&self, _payload: String) -> impl Future<Output = Reply> + Send {
        async { Reply::new("[{\"index\": \"zero\"}]") }
    }
}

#[tokio::test]
async fn get_chain_on_fresh_node_returns_genesis() -> Result<()> {
    let node = serve_chain(Chain::new()).await;
    let reply = transport().send(&node.addr, "GET CHAIN").await?;
    let records: Vec<BlockRecord> = serde_json::from_str(&reply)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].index, 0);
    assert_eq!(records[0].prev_hash, "0000");
    assert_eq!(records[0].hash, GENESIS_HASH);
    assert!(records[0].data.is_empty());
    Ok(())
}

#[tokio::test]
async fn shutdown_replies_exiting_and_stops_serving() -> Result<()> {
    let node = serve_chain(Chain::new()).await;
    assert_eq!(transport().send(&node.addr, "shutdown").await?, EXITING);
    tokio::time::timeout(Duration::from_secs(2), node.handle).await??;
    assert!(node.coordinator.is_stopping());
    assert!(transport().send(&node.addr, "GET CHAIN").await.is_err());
    Ok(())
}

#[tokio::test]
async fn equal_length_chain_is_rejected() -> Result<()> {
    let node = serve_chain(three_blocks()).await;
    let candidate = three_blocks().to_json()?;
    assert_eq!(transport().send(&node.addr, &candidate).await?, BLOCKCHAIN_REJECTED);
    assert_eq!(node.coordinator.size().await, 3);
    Ok(())
}

#[tokio::test]
async fn equal_length_fork_keeps_the_local_chain() -> Result<()> {
    let node = serve_chain(two_blocks()).await;
    let fork = forked_two_blocks().to_json()?;
    assert_eq!(transport().send(&node.addr, &fork).await?, BLOCKCHAIN_REJECTED);
    let tip = node.coordinator.snapshot().await.tip().map(|b| b.hash().to_string());
    assert_eq!(tip.as_deref(), Some(BLOCK1_HASH));
    Ok(())
}

#[tokio::test]
async fn longer_valid_chain_is_adopted() -> Result<()> {
    let node = serve_chain(Chain::new()).await;
    let candidate = four_blocks().to_json()?;
    assert_eq!(transport().send(&node.addr, &candidate).await?, BLOCKCHAIN_ACCEPTED);
    assert_eq!(node.coordinator.size().await, 4);
    assert_eq!(node.coordinator.chain_as_json().await?, candidate);
    Ok(())
}

#[tokio::test]
async fn longer_tampered_chain_is_rejected() -> Result<()> {
    let node = serve_chain(three_blocks()).await;
    let before = node.coordinator.chain_as_json().await?;
    assert_eq!(
        transport().send(&node.addr, &tampered_four_blocks()).await?,
        BLOCKCHAIN_REJECTED
    );
    assert_eq!(node.coordinator.chain_as_json().await?, before);
    Ok(())
}

#[tokio::test]
async fn garbage_is_invalid_json() -> Result<()> {
    let node = serve_chain(Chain::new()).await;
    assert_eq!(transport().send(&node.addr, "hello there").await?, INVALID_JSON);
    assert_eq!(transport().send(&node.addr, r#"{"index": 0}"#).await?, INVALID_JSON);
    assert_eq!(node.coordinator.size().await, 1);
    Ok(())
}

#[tokio::test]
async fn sync_pulls_the_longest_chain() -> Result<()> {
    let short = serve_chain(two_blocks()).await;
    let long = serve_chain(four_blocks()).await;
    let node = start_node(vec![], None).await;

    for served in [&short, &long] {
        let (address, port) = served.addr.rsplit_once(':').expect("host:port");
        node.registry.register(&Peer::new(address, port.parse()?))?;
    }

    let report = node.coordinator.sync_with_peers(&node.registry).await?;
    assert_eq!(node.coordinator.chain_as_json().await?, four_blocks().to_json()?);
    assert!(report.unreachable.is_empty());
    assert!(report.malformed.is_empty());
    Ok(())
}

#[tokio::test]
async fn later_peer_beats_chain_adopted_earlier_in_the_round() -> Result<()> {
    let mut chains = vec![two_blocks(), four_blocks(), three_blocks()];
    let mut served = Vec::new();
    for chain in chains.drain(..) {
        served.push(serve_chain(chain).await);
    }
    let node = start_node(vec![], None).await;
    for s in &served {
        let (address, port) = s.addr.rsplit_once(':').expect("host:port");
        node.registry.register(&Peer::new(address, port.parse()?))?;
    }

    node.coordinator.sync_with_peers(&node.registry).await?;
    assert_eq!(node.coordinator.size().await, 4);
    assert_eq!(
        node.coordinator.chain_as_json().await?,
        four_blocks().to_json()?
    );
    Ok(())
}

#[tokio::test]
async fn unreachable_peer_is_skipped() -> Result<()> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let dead_port = listener.local_addr()?.port();
    drop(listener);

    let long = serve_chain(three_blocks()).await;
    let node = start_node(vec![], None).await;
    node.registry.register(&Peer::new("127.0.0.1", dead_port))?;
    let (address, port) = long.addr.rsplit_once(':').expect("host:port");
    node.registry.register(&Peer::new(address, port.parse()?))?;

    let report = node.coordinator.sync_with_peers(&node.registry).await?;
    assert_eq!(report.unreachable, vec![Peer::new("127.0.0.1", dead_port)]);
    assert_eq!(node.coordinator.size().await, 3);
    Ok(())
}

#[tokio::test]
async fn sync_skips_the_local_node() -> Result<()> {
    let node = start_node(vec![], None).await;
    assert!(node.registry.list_peers()?.contains(&node.peer()));
    let report = node.coordinator.sync_with_peers(&node.registry).await?;
    assert!(report.adopted.is_empty());
    assert!(report.unreachable.is_empty());
    Ok(())
}

#[tokio::test]
async fn node_adopts_seed_chain_on_startup() -> Result<()> {
    let seed = serve_chain(four_blocks()).await;
    let (address, port) = seed.addr.rsplit_once(':').expect("host:port");
    let node = start_node(vec![Peer::new(address, port.parse()?)], None).await;
    assert!(wait_for_size(&node.coordinator, 4).await);
    Ok(())
}

#[tokio::test]
async fn broadcast_pushes_the_local_chain() -> Result<()> {
    let behind = serve_chain(Chain::new()).await;
    let ahead = serve_chain(four_blocks()).await;
    let node = start_node(vec![], None).await;
    node.coordinator.offer(three_blocks()).await;

    for s in [&behind, &ahead] {
        let (address, port) = s.addr.rsplit_once(':').expect("host:port");
        node.registry.register(&Peer::new(address, port.parse()?))?;
    }
    let dead = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let dead_port = dead.local_addr()?.port();
    drop(dead);
    node.registry.register(&Peer::new("127.0.0.1", dead_port))?;

    let report = node.coordinator.broadcast(&node.registry).await?;
    assert_eq!((report.accepted, report.rejected, report.failed), (1, 1, 1));
    assert_eq!(
        behind.coordinator.chain_as_json().await?,
        node.coordinator.chain_as_json().await?
    );
    assert_eq!(ahead.coordinator.size().await, 4);
    Ok(())
}

#[tokio::test]
async fn shutdown_message_unregisters_the_node() -> Result<()> {
    let node = start_node(vec![], None).await;
    assert!(node.registry.list_peers()?.contains(&node.peer()));

    assert_eq!(transport().send(&node.addr(), "SHUTDOWN").await?, EXITING);
    tokio::time::timeout(Duration::from_secs(2), node.handle).await??;
    assert!(node.registry.list_peers()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn periodic_sync_converges_two_nodes() -> Result<()> {
    let first = start_node(vec![], Some(Duration::from_millis(100))).await;
    let second = start_node(vec![first.peer()], Some(Duration::from_millis(100))).await;
    first.registry.register(&second.peer())?;

    first.coordinator.offer(three_blocks()).await;
    assert!(wait_for_size(&second.coordinator, 3).await);
    Ok(())
}

#[tokio::test]
async fn garbled_peer_is_reported_as_malformed() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let garbled_port = listener.local_addr()?.port();
    tokio::spawn(async move {
        let _ = transport().serve(listener, &Garbled).await;
    });

    let node = start_node(vec![], None).await;
    node.registry.register(&Peer::new("127.0.0.1", garbled_port))?;

    let report = node.coordinator.sync_with_peers(&node.registry).await?;
    assert_eq!(report.malformed, vec![Peer::new("127.0.0.1", garbled_port)]);
    assert!(report.adopted.is_empty());
    assert!(report.unreachable.is_empty());
    assert_eq!(node.coordinator.size().await, 1);
    Ok(())
}

#[tokio::test]
async fn node_serves_while_initial_sync_waits_on_a_silent_seed() -> Result<()> {
    let silent = TcpListener::bind("127.0.0.1:0").await?;
    let silent_port = silent.local_addr()?.port();
    let _hold = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = silent.accept().await {
            held.push(stream);
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    let dir = tempfile::tempdir()?;
    let config = NodeConfig {
        port,
        registry_dir: dir.path().to_path_buf(),
        seeds: vec![Peer::new("127.0.0.1", silent_port)],
        timeout: Duration::from_secs(5),
        sync_interval: None,
        ..NodeConfig::default()
    };
    let registry = SledRegistry::open(&config.registry_dir, config.local_peer())?;
    let node = Node::new(config, Arc::new(registry))?;
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        node.run(listener, async {
            let _ = stopped.await;
        })
        .await
    });

    let reply = tokio::time::timeout(
        Duration::from_secs(1),
        transport().send(&format!("127.0.0.1:{port}"), "GET CHAIN"),
    )
    .await??;
    let records: Vec<BlockRecord> = serde_json::from_str(&reply)?;
    assert_eq!(records.len(), 1);

    let _ = stop.send(());
    tokio::time::timeout(Duration::from_secs(2), handle).await???;
    Ok(())
}
