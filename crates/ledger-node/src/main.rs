use anyhow::Context;
use clap::Parser;
use ledger_core::constants::GENESIS_TIMESTAMP;
use ledger_node::{
    config::default_registry_dir,
    constants::{
        DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT, DEFAULT_SYNC_INTERVAL_SECS,
        DEFAULT_TIMEOUT_MS,
    },
    Node, NodeConfig, PeerTransport,
};
use ledger_storage::{Peer, SledRegistry};
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(name = "ledger-node", about = "Peer node serving and syncing the ledger")]
struct Args {
    /// Port to listen on for peer messages
    #[arg(long, env = "LEDGER_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Address to bind and to advertise to peers
    #[arg(long, env = "LEDGER_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Peer registry directory (defaults to ./data/registry-<port>)
    #[arg(long, env = "LEDGER_REGISTRY_DIR")]
    registry_dir: Option<PathBuf>,

    /// Seed peer as host:port; may be repeated
    #[arg(long = "peer", env = "LEDGER_PEERS", value_delimiter = ',')]
    peers: Vec<Peer>,

    /// Timeout for every peer exchange, in milliseconds
    #[arg(long, env = "LEDGER_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Largest frame accepted from a peer
    #[arg(long, env = "LEDGER_MAX_FRAME_BYTES", default_value_t = DEFAULT_MAX_FRAME_BYTES)]
    max_frame_bytes: usize,

    /// Seconds between background sync rounds; 0 disables them
    #[arg(long, env = "LEDGER_SYNC_INTERVAL_SECS", default_value_t = DEFAULT_SYNC_INTERVAL_SECS)]
    sync_interval_secs: u64,

    /// Timestamp of the genesis block shared by every peer
    #[arg(long, env = "LEDGER_GENESIS_TIMESTAMP", default_value = GENESIS_TIMESTAMP)]
    genesis_timestamp: String,
}

impl From<Args> for NodeConfig {
    fn from(args: Args) -> Self {
        Self {
            registry_dir: args
                .registry_dir
                .unwrap_or_else(|| default_registry_dir(args.port)),
            host: args.host,
            port: args.port,
            seeds: args.peers,
            timeout: Duration::from_millis(args.timeout_ms),
            max_frame_bytes: args.max_frame_bytes,
            sync_interval: (args.sync_interval_secs > 0)
                .then(|| Duration::from_secs(args.sync_interval_secs)),
            genesis_timestamp: args.genesis_timestamp,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = NodeConfig::from(Args::parse());
    let registry = SledRegistry::open(&config.registry_dir, config.local_peer())?;
    let listener = PeerTransport::bind(&config.listen_addr())
        .await
        .with_context(|| format!("binding {}", config.listen_addr()))?;
    info!(port = config.port, "ledger-node starting");

    let node = Node::new(config, Arc::new(registry.clone()))?;
    node.run(listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await?;

    registry.close()?;
    Ok(())
}
