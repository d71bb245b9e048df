use crate::{
    config::NodeConfig,
    error::NodeError,
    protocol::{
        Inbound, Verdict, BLOCKCHAIN_ACCEPTED, EXITING, GET_CHAIN, INVALID_JSON, SERVER_ERROR,
    },
    transport::{Handler, PeerTransport, Reply},
};
use ledger_core::{mine, Block, BlockRecord, Chain, Data, LedgerError};
use ledger_storage::{Peer, PeerRegistry};
use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// How often a freshly mined block is retried when the tip moved underneath it.
const MINE_ATTEMPTS: usize = 3;

/// Outcome of one sync round. `adopted` is in adoption order; `malformed`
/// holds peers that answered with something other than a chain.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub adopted: Vec<Peer>,
    pub unreachable: Vec<Peer>,
    pub malformed: Vec<Peer>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
}

/// Owns the local chain and decides when a peer's chain replaces it.
///
/// Every read or replacement of the chain goes through one async mutex.
/// Candidate chains are validated before the lock is taken, so only the
/// length comparison and the swap happen under it.
pub struct SyncCoordinator {
    chain: Mutex<Chain>,
    genesis: Block,
    transport: PeerTransport,
    stopping: AtomicBool,
}

impl SyncCoordinator {
    pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
        let genesis = config.genesis()?;
        Ok(Self::with_chain(
            Chain::with_genesis(genesis),
            PeerTransport::from_config(config),
        ))
    }

    pub fn with_chain(chain: Chain, transport: PeerTransport) -> Self {
        Self {
            genesis: chain.genesis_block().clone(),
            chain: Mutex::new(chain),
            transport,
            stopping: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &PeerTransport {
        &self.transport
    }

    pub async fn size(&self) -> usize {
        self.chain.lock().await.size()
    }

    pub async fn snapshot(&self) -> Chain {
        self.chain.lock().await.clone()
    }

    pub async fn chain_as_json(&self) -> Result<String, NodeError> {
        Ok(self.chain.lock().await.to_json()?)
    }

    pub async fn is_valid(&self) -> bool {
        self.chain.lock().await.is_valid()
    }

    pub async fn valid_len(&self) -> i64 {
        self.chain.lock().await.valid_len()
    }

    /// Mines `data` on top of the current tip. The lock is only held to read
    /// the tip; the nonce search runs on the blocking pool.
    pub async fn mine_data(&self, data: Data) -> Result<Block, NodeError> {
        let prev_hash = {
            let chain = self.chain.lock().await;
            chain
                .tip()
                .map(|tip| tip.hash().to_string())
                .ok_or_else(|| LedgerError::MalformedChain("chain has no tip to extend".into()))?
        };
        let block = tokio::task::spawn_blocking(move || mine::mine(Block::new(prev_hash, data)))
            .await??;
        Ok(block)
    }

    pub async fn append_mined(&self, block: Block) -> Result<(), NodeError> {
        self.chain.lock().await.append_mined(block)?;
        Ok(())
    }

    /// Mines and appends, mining again if another chain was adopted meanwhile.
    pub async fn mine_and_append(&self, data: Data) -> Result<Block, NodeError> {
        let mut attempt = 1;
        loop {
            let block = self.mine_data(data.clone()).await?;
            match self.append_mined(block.clone()).await {
                Ok(()) => return Ok(block),
                Err(NodeError::Ledger(LedgerError::StaleBlock { .. })) if attempt < MINE_ATTEMPTS => {
                    debug!(attempt, "tip moved while mining, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Adopts `candidate` if it is valid and strictly longer than the local chain.
    pub async fn offer(&self, candidate: Chain) -> Verdict {
        let validation = candidate.validate();
        if !validation.ok {
            return Verdict::Rejected;
        }
        let mut chain = self.chain.lock().await;
        if validation.length <= chain.size() as i64 {
            debug!(
                candidate = validation.length,
                local = chain.size(),
                "candidate chain is not longer"
            );
            return Verdict::Rejected;
        }
        chain.replace(candidate);
        info!(size = chain.size(), "adopted longer chain");
        Verdict::Accepted
    }

    pub async fn offer_records(&self, records: Vec<BlockRecord>) -> Verdict {
        self.offer(Chain::from_records(&self.genesis, records)).await
    }

    /// Answers one peer message.
    pub async fn handle_inbound(&self, payload: &str) -> Reply {
        match Inbound::parse(payload) {
            Inbound::GetChain => match self.chain_as_json().await {
                Ok(json) => Reply::new(json),
                Err(e) => {
                    warn!("failed to serialize chain: {e}");
                    Reply::new(SERVER_ERROR)
                }
            },
            Inbound::Shutdown => {
                self.stopping.store(true, Ordering::SeqCst);
                info!("shutdown requested");
                Reply::stop(EXITING)
            }
            Inbound::Candidate(records) => Reply::new(self.offer_records(records).await.as_reply()),
            Inbound::Invalid => Reply::new(INVALID_JSON),
        }
    }

    /// Pulls every other peer's chain and keeps the longest valid one.
    ///
    /// Each candidate is compared against the chain as it stands at that
    /// moment, so a later peer can still beat a chain adopted earlier in the
    /// same round. Unreachable or garbled peers are skipped.
    pub async fn sync_with_peers(
        &self,
        registry: &dyn PeerRegistry,
    ) -> Result<SyncReport, NodeError> {
        let peers = registry.list_peers().map_err(NodeError::Registry)?;
        let local = registry.local();
        let mut report = SyncReport::default();

        for peer in peers.into_iter().filter(|peer| peer.port != local.port) {
            let reply = match self.transport.send(&peer.socket_addr(), GET_CHAIN).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(%peer, "skipping peer: {e}");
                    report.unreachable.push(peer);
                    continue;
                }
            };
            let candidate = match Chain::reconstruct_with(&self.genesis, &reply) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(%peer, "peer sent an unreadable chain: {e}");
                    report.malformed.push(peer);
                    continue;
                }
            };
            if self.offer(candidate).await == Verdict::Accepted {
                info!(%peer, "synced chain from peer");
                report.adopted.push(peer);
            }
        }
        Ok(report)
    }

    /// Pushes the local chain to every other peer.
    pub async fn broadcast(&self, registry: &dyn PeerRegistry) -> Result<BroadcastReport, NodeError> {
        let peers = registry.list_peers().map_err(NodeError::Registry)?;
        let local = registry.local();
        let json = self.chain_as_json().await?;
        let mut report = BroadcastReport::default();

        for peer in peers.iter().filter(|peer| peer.port != local.port) {
            match self.transport.send(&peer.socket_addr(), &json).await {
                Ok(reply) if reply == BLOCKCHAIN_ACCEPTED => report.accepted += 1,
                Ok(reply) => {
                    debug!(%peer, "peer answered {reply}");
                    report.rejected += 1;
                }
                Err(e) => {
                    warn!(%peer, "broadcast failed: {e}");
                    report.failed += 1;
                }
            }
        }
        info!(
            accepted = report.accepted,
            rejected = report.rejected,
            failed = report.failed,
            "broadcast finished"
        );
        Ok(report)
    }

    /// Set once a `SHUTDOWN` message has been answered.
    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }
}

impl Handler for SyncCoordinator {
    fn handle(&self, payload: String) -> impl Future<Output = Reply> + Send {
        async move { self.handle_inbound(&payload).await }
    }
}
