use crate::constants::{
    DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT, DEFAULT_SYNC_INTERVAL_SECS,
    DEFAULT_TIMEOUT_MS,
};
use ledger_core::{constants::GENESIS_TIMESTAMP, timestamp_is_valid, Block, LedgerError};
use ledger_storage::Peer;
use std::{path::PathBuf, time::Duration};

/// Settings for one node, normally built from the command line.
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub registry_dir: PathBuf,
    /// Peers registered at startup in addition to whatever the registry holds.
    pub seeds: Vec<Peer>,
    /// Bound on every inbound read and outbound exchange.
    pub timeout: Duration,
    pub max_frame_bytes: usize,
    /// `None` disables the background sync task.
    pub sync_interval: Option<Duration>,
    pub genesis_timestamp: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            registry_dir: default_registry_dir(DEFAULT_PORT),
            seeds: Vec::new(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            sync_interval: Some(Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS)),
            genesis_timestamp: GENESIS_TIMESTAMP.to_string(),
        }
    }
}

impl NodeConfig {
    pub fn local_peer(&self) -> Peer {
        Peer::new(self.host.clone(), self.port)
    }

    pub fn listen_addr(&self) -> String {
        self.local_peer().socket_addr()
    }

    /// Genesis block every chain this node accepts must start with.
    pub fn genesis(&self) -> Result<Block, LedgerError> {
        if !timestamp_is_valid(&self.genesis_timestamp) {
            return Err(LedgerError::MalformedTimestamp(self.genesis_timestamp.clone()));
        }
        Ok(Block::genesis(self.genesis_timestamp.clone()))
    }
}

pub fn default_registry_dir(port: u16) -> PathBuf {
    PathBuf::from("./data").join(format!("registry-{port}"))
}
