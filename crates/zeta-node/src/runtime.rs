//! # Node Runtime
//!
//! Wires a key-value store and a header source into a running sync.
//!
//! ## Startup Sequence
//!
//! 1. Open the chain store over the configured backend
//! 2. Bootstrap from the network's latest checkpoint
//! 3. Start catch-up, live tip, repair and status tasks
//! 4. Run until Ctrl+C or the first task failure

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use zeta_header_sync::{
    ChainGraphStore, HeaderSource, HeaderSyncApi, HeaderSyncError, HeaderSyncService,
    KeyValueStore, QuorumHeaderSource, SyncSupervisor,
};

use crate::adapters::ElectrumClient;
use crate::container::NodeConfig;

/// The node runtime: one sync service over one store.
pub struct NodeRuntime<S: HeaderSource + ?Sized, K: KeyValueStore> {
    service: Arc<HeaderSyncService<S, K>>,
}

impl<S, K> NodeRuntime<S, K>
where
    S: HeaderSource + ?Sized + 'static,
    K: KeyValueStore + 'static,
{
    /// Open the chain store over `kv` and build the sync service.
    pub fn new(config: &NodeConfig, kv: K, source: Arc<S>) -> Result<Self, HeaderSyncError> {
        let store = ChainGraphStore::open(kv)?;
        info!(
            "[zeta-node] Opened header store with {} headers",
            store.len()
        );
        let service = HeaderSyncService::new(config.sync.clone(), store.into_shared(), source);
        Ok(Self {
            service: Arc::new(service),
        })
    }

    /// The sync service.
    pub fn service(&self) -> &Arc<HeaderSyncService<S, K>> {
        &self.service
    }

    /// Bootstrap from the latest checkpoint and start every sync task.
    pub async fn start(&self) -> Result<SyncSupervisor<S, K>, HeaderSyncError> {
        let network = self.service.config().network;
        let checkpoint = network.latest_checkpoint();
        info!(
            "[zeta-node] Network {}, checkpoint at height {}",
            network, checkpoint.height
        );

        let start_height = self.service.bootstrap(&checkpoint).await?;
        let mut supervisor = SyncSupervisor::new(Arc::clone(&self.service));
        supervisor.start(start_height);
        Ok(supervisor)
    }
}

/// Connect to every configured Electrum server.
///
/// Unreachable servers are skipped; at least one must connect.
pub async fn connect_electrum(
    config: &NodeConfig,
) -> Result<Vec<Arc<ElectrumClient>>, HeaderSyncError> {
    let timeout = Duration::from_secs(config.electrum.request_timeout_secs);
    let mut clients = Vec::new();

    for address in &config.electrum.servers {
        match ElectrumClient::connect(
            address,
            &config.electrum.user_agent,
            timeout,
            config.sync.subscription_buffer,
        )
        .await
        {
            Ok(client) => clients.push(Arc::new(client)),
            Err(e) => warn!("[zeta-node] Skipping {}: {}", address, e),
        }
    }

    if clients.is_empty() {
        return Err(HeaderSyncError::Network(
            "no Electrum server reachable".to_string(),
        ));
    }
    info!(
        "[zeta-node] Connected to {}/{} Electrum servers",
        clients.len(),
        config.electrum.servers.len()
    );
    Ok(clients)
}

/// Merge Electrum clients into one quorum source.
pub fn quorum_source(
    config: &NodeConfig,
    clients: &[Arc<ElectrumClient>],
) -> QuorumHeaderSource<ElectrumClient> {
    QuorumHeaderSource::new(
        clients.to_vec(),
        config.electrum.quorum(config.sync.subscription_buffer),
    )
}

/// Ping every client each `interval` until shutdown.
///
/// A failed ping is logged; the live-tip task notices a dead connection
/// when its subscription closes.
pub async fn keepalive(
    clients: Vec<Arc<ElectrumClient>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), HeaderSyncError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            _ = ticker.tick() => {
                for client in &clients {
                    if let Err(e) = client.ping().await {
                        warn!("[zeta-node] Keepalive to {} failed: {}", client.address(), e);
                    }
                }
            }
        }
    }
}
