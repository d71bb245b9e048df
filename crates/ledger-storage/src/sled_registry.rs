use crate::{Peer, PeerRegistry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sled::{Db, IVec, Tree};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const TREE_PEERS: &str = "peers";

#[derive(Debug, Serialize, Deserialize)]
struct PeerEntry {
  address: String,
  registered_at: u64,
}

/// Peer registry in an embedded sled database. Sled holds an exclusive lock
/// on the directory, so this handle is the single writer for it.
#[derive(Clone)]
pub struct SledRegistry {
  db: Db,
  peers: Tree,
  local: Peer,
}

impl SledRegistry {
  pub fn open<P: AsRef<Path>>(path: P, local: Peer) -> Result<Self> {
    let path = path.as_ref();
    let db = sled::open(path)
      .with_context(|| format!("opening peer registry at {}", path.display()))?;
    let peers = db.open_tree(TREE_PEERS)?;
    info!(path = %path.display(), "peer registry opened");
    Ok(Self { db, peers, local })
  }

  pub fn close(&self) -> Result<()> {
    self.db.flush()?;
    Ok(())
  }

  pub fn clear(&self) -> Result<()> {
    self.peers.clear()?;
    self.db.flush()?;
    Ok(())
  }

  fn decode(key: &IVec, value: &IVec) -> Result<Peer> {
    let port: [u8; 2] = key
      .as_ref()
      .try_into()
      .context("peer key is not a u16 port")?;
    let entry: PeerEntry = bincode::deserialize(value).context("decoding peer entry")?;
    Ok(Peer::new(entry.address, u16::from_be_bytes(port)))
  }
}

impl PeerRegistry for SledRegistry {
  fn list_peers(&self) -> Result<Vec<Peer>> {
    let mut peers = Vec::new();
    for item in self.peers.iter() {
      let (key, value) = item?;
      match Self::decode(&key, &value) {
        Ok(peer) => peers.push(peer),
        Err(e) => warn!("skipping unreadable registry entry: {e:#}"),
      }
    }
    Ok(peers)
  }

  fn register(&self, peer: &Peer) -> Result<()> {
    let entry = PeerEntry {
      address: peer.address.clone(),
      registered_at: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default(),
    };
    self
      .peers
      .insert(peer.port.to_be_bytes(), bincode::serialize(&entry)?)?;
    self.db.flush()?;
    info!(%peer, "peer registered");
    Ok(())
  }

  fn unregister(&self, port: u16) -> Result<()> {
    if self.peers.remove(port.to_be_bytes())?.is_some() {
      info!(port, "peer unregistered");
    }
    self.db.flush()?;
    Ok(())
  }

  fn local(&self) -> &Peer {
    &self.local
  }
}
