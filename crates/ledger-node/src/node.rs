use crate::{config::NodeConfig, error::NodeError, sync::SyncCoordinator};
use ledger_storage::PeerRegistry;
use std::{future::Future, sync::Arc, time::Duration};
use tokio::{net::TcpListener, task::JoinHandle};
use tracing::{info, warn};

/// A listening peer: its chain, its registry handle and its lifecycle.
pub struct Node {
    config: NodeConfig,
    coordinator: Arc<SyncCoordinator>,
    registry: Arc<dyn PeerRegistry>,
}

impl Node {
    pub fn new(config: NodeConfig, registry: Arc<dyn PeerRegistry>) -> Result<Self, NodeError> {
        let coordinator = Arc::new(SyncCoordinator::new(&config)?);
        Ok(Self {
            config,
            coordinator,
            registry,
        })
    }

    pub fn coordinator(&self) -> Arc<SyncCoordinator> {
        self.coordinator.clone()
    }

    /// Joins the network, serves peers until a `SHUTDOWN` message arrives or
    /// `shutdown` resolves, then leaves the network again.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), NodeError>
    where
        F: Future<Output = ()>,
    {
        self.registry.add_self().map_err(NodeError::Registry)?;
        for seed in &self.config.seeds {
            if let Err(e) = self.registry.register(seed) {
                warn!(%seed, "could not register seed peer: {e:#}");
            }
        }

        // Initial sync runs beside the serve loop, never ahead of it.
        let background = spawn_sync_task(
            self.coordinator.clone(),
            self.registry.clone(),
            self.config.sync_interval,
        );

        let transport = *self.coordinator.transport();
        let served = tokio::select! {
            served = transport.serve(listener, self.coordinator.as_ref()) => served.map_err(NodeError::from),
            _ = shutdown => {
                info!("interrupted, shutting down");
                Ok(())
            }
        };

        background.abort();
        if let Err(e) = self.registry.remove_self() {
            warn!("could not unregister from peer registry: {e:#}");
        }
        info!(port = self.config.port, "node stopped");
        served
    }
}

/// Runs one sync round right away, then, if `every` is set, periodically
/// pulls the longest chain and announces local growth.
fn spawn_sync_task(
    coordinator: Arc<SyncCoordinator>,
    registry: Arc<dyn PeerRegistry>,
    every: Option<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        match coordinator.sync_with_peers(registry.as_ref()).await {
            Ok(report) => info!(
                adopted = report.adopted.len(),
                unreachable = report.unreachable.len(),
                malformed = report.malformed.len(),
                "initial sync finished"
            ),
            Err(e) => warn!("initial sync failed: {e}"),
        }
        let Some(every) = every else {
            return;
        };

        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        let mut announced = coordinator.size().await;
        loop {
            ticker.tick().await;
            if coordinator.is_stopping() {
                break;
            }
            if let Err(e) = coordinator.sync_with_peers(registry.as_ref()).await {
                warn!("sync round failed: {e}");
            }
            let size = coordinator.size().await;
            if size > announced {
                match coordinator.broadcast(registry.as_ref()).await {
                    Ok(_) => announced = size,
                    Err(e) => warn!("broadcast failed: {e}"),
                }
            }
        }
    })
}
