use clap::Parser;
use ledger_core::{constants::GENESIS_TIMESTAMP, Block};
use ledger_gateway::{router, GatewayState};
use ledger_node::{
    constants::{DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_TIMEOUT_MS},
    PeerTransport,
};
use std::{net::SocketAddr, time::Duration};
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "ledger-gateway", about = "HTTP gateway to the ledger peer network")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "LEDGER_GATEWAY_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Host the peer nodes listen on
    #[arg(long, env = "LEDGER_PEER_HOST", default_value = DEFAULT_HOST)]
    peer_host: String,

    /// Timeout for every node exchange, in milliseconds
    #[arg(long, env = "LEDGER_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Timestamp of the genesis block the nodes were started with
    #[arg(long, env = "LEDGER_GENESIS_TIMESTAMP", default_value = GENESIS_TIMESTAMP)]
    genesis_timestamp: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if !ledger_core::timestamp_is_valid(&args.genesis_timestamp) {
        anyhow::bail!("malformed genesis timestamp {:?}", args.genesis_timestamp);
    }
    let state = GatewayState {
        peer_host: args.peer_host,
        transport: PeerTransport::new(
            Duration::from_millis(args.timeout_ms),
            DEFAULT_MAX_FRAME_BYTES,
        ),
        genesis: Block::genesis(args.genesis_timestamp),
    };

    let addr: SocketAddr = args.listen.parse()?;
    info!("ledger-gateway listening on http://{addr}");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, router(state)).await?;
    Ok(())
}
