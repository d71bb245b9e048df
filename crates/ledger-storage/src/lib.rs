pub mod sled_registry;

pub use sled_registry::SledRegistry;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// A listening node, identified by its port.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Peer {
    pub port: u16,
    pub address: String,
}

impl Peer {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            port,
            address: address.into(),
        }
    }

    /// `host:port`, suitable for `TcpStream::connect`.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl FromStr for Peer {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (address, port) = s
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("expected host:port, got {s:?}"))?;
        if address.is_empty() {
            return Err(anyhow!("missing host in {s:?}"));
        }
        let port = port
            .parse()
            .with_context(|| format!("invalid port in {s:?}"))?;
        Ok(Self::new(address, port))
    }
}

/// Membership list the sync layer walks. Peers are keyed by port.
pub trait PeerRegistry: Send + Sync {
    fn list_peers(&self) -> Result<Vec<Peer>>;
    fn register(&self, peer: &Peer) -> Result<()>;
    fn unregister(&self, port: u16) -> Result<()>;
    /// The node this registry handle belongs to.
    fn local(&self) -> &Peer;

    fn add_self(&self) -> Result<()> {
        self.register(self.local())
    }

    fn remove_self(&self) -> Result<()> {
        self.unregister(self.local().port)
    }
}
