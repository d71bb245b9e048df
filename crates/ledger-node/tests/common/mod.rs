#![allow(dead_code)]

use ledger_core::{Block, BlockRecord, Chain, Data};
use ledger_node::{Node, NodeConfig, PeerTransport, SyncCoordinator};
use ledger_storage::{Peer, SledRegistry};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tempfile::{tempdir, TempDir};
use tokio::{net::TcpListener, sync::oneshot, task::JoinHandle};

pub const GENESIS_HASH: &str = "4e6c6494ecba8a020b1f97118b0c0b83afe3a7ebe9a651247823e9a33bbe1588";
pub const BLOCK1_HASH: &str = "00002ea4d58dffd1fb3ffa93ce05512d944a95db905a4cbb3adfcb4f08e02af4";
pub const BLOCK2_HASH: &str = "0000c671b3722bfe0a19023ae6bd92963cf239f72f0edd49411768a88dd75a87";
pub const BLOCK3_HASH: &str = "0000f26b227fed17ec39d3315383f281c5970783a54f6c6293e1df6b3d14b9db";
pub const FORK1_HASH: &str = "00002ba2f0a7ef04b2d789321fc515caf358df81779c34bc2599c4f7aae6de7e";

pub const TEST_TIMEOUT: Duration = Duration::from_millis(500);

fn object(value: Value) -> Data {
    value.as_object().cloned().unwrap_or_default()
}

fn record(timestamp: &str, nonce: u64, prev_hash: &str, hash: &str, data: Value) -> BlockRecord {
    BlockRecord {
        index: 0,
        timestamp: timestamp.into(),
        nonce,
        prev_hash: prev_hash.into(),
        hash: hash.into(),
        data: object(data),
    }
}

fn block1() -> BlockRecord {
    record("16/10/2026, 12:00:00", 36331, GENESIS_HASH, BLOCK1_HASH, json!({"msg": "hello"}))
}

fn block2() -> BlockRecord {
    record(
        "16/10/2026, 12:05:00",
        66000,
        BLOCK1_HASH,
        BLOCK2_HASH,
        json!({"transactions": [{"transaction": {"amount": 113, "from": "alice", "to": "bob"}}]}),
    )
}

fn block3() -> BlockRecord {
    record("16/10/2026, 12:10:00", 1078, BLOCK2_HASH, BLOCK3_HASH, json!({"msg": "third"}))
}

fn fork1() -> BlockRecord {
    record("16/10/2026, 12:01:00", 75679, GENESIS_HASH, FORK1_HASH, json!({"msg": "fork"}))
}

fn chain_of(records: Vec<BlockRecord>) -> Chain {
    let mut chain = Chain::new();
    for record in records {
        chain.append(Block::from_record(record));
    }
    chain
}

/// Genesis, block 1.
pub fn two_blocks() -> Chain {
    chain_of(vec![block1()])
}

/// Genesis, block 1, block 2.
pub fn three_blocks() -> Chain {
    chain_of(vec![block1(), block2()])
}

/// Genesis, block 1, block 2, block 3.
pub fn four_blocks() -> Chain {
    chain_of(vec![block1(), block2(), block3()])
}

/// Genesis and a competing first block.
pub fn forked_two_blocks() -> Chain {
    chain_of(vec![fork1()])
}

/// Four blocks long, but block 2 was edited after mining.
pub fn tampered_four_blocks() -> String {
    let mut raw: Vec<Value> =
        serde_json::from_str(&four_blocks().to_json().expect("serializable")).expect("json list");
    raw[2]["data"] = json!({"transactions": [{"transaction": {"amount": 9999, "from": "alice", "to": "bob"}}]});
    Value::Array(raw).to_string()
}

pub fn transport() -> PeerTransport {
    PeerTransport::new(TEST_TIMEOUT, 1024 * 1024)
}

/// A coordinator serving on an ephemeral port in the background.
pub struct Served {
    pub addr: String,
    pub coordinator: Arc<SyncCoordinator>,
    pub handle: JoinHandle<()>,
}

pub async fn serve_chain(chain: Chain) -> Served {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr").to_string();
    let coordinator = Arc::new(SyncCoordinator::with_chain(chain, transport()));
    let served = coordinator.clone();
    let handle = tokio::spawn(async move {
        let _ = transport().serve(listener, served.as_ref()).await;
    });
    Served {
        addr,
        coordinator,
        handle,
    }
}

/// A full node on an ephemeral port with its own registry directory.
pub struct RunningNode {
    pub port: u16,
    pub coordinator: Arc<SyncCoordinator>,
    pub registry: SledRegistry,
    pub stop: Option<oneshot::Sender<()>>,
    pub handle: JoinHandle<()>,
    _dir: TempDir,
}

impl RunningNode {
    pub fn peer(&self) -> Peer {
        Peer::new("127.0.0.1", self.port)
    }

    pub fn addr(&self) -> String {
        self.peer().socket_addr()
    }
}

pub async fn start_node(seeds: Vec<Peer>, sync_interval: Option<Duration>) -> RunningNode {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("local addr").port();
    let dir = tempdir().expect("temp dir");
    let config = NodeConfig {
        port,
        registry_dir: dir.path().to_path_buf(),
        seeds,
        timeout: TEST_TIMEOUT,
        sync_interval,
        ..NodeConfig::default()
    };
    let registry =
        SledRegistry::open(&config.registry_dir, config.local_peer()).expect("open registry");
    let node = Node::new(config, Arc::new(registry.clone())).expect("node");
    let coordinator = node.coordinator();
    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let _ = node
            .run(listener, async {
                let _ = stopped.await;
            })
            .await;
    });
    // Wait until the serve loop answers.
    let addr = format!("127.0.0.1:{port}");
    for _ in 0..40 {
        if transport().send(&addr, "GET CHAIN").await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    RunningNode {
        port,
        coordinator,
        registry,
        stop: Some(stop),
        handle,
        _dir: dir,
    }
}

/// Polls until the coordinator's chain reaches `size` or two seconds pass.
pub async fn wait_for_size(coordinator: &SyncCoordinator, size: usize) -> bool {
    for _ in 0..40 {
        if coordinator.size().await == size {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
