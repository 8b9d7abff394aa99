//! # Zeta Node
//!
//! Follows the Bitcoin header chain from Electrum servers and keeps a
//! validated header store on disk.
//!
//! ## Startup Sequence
//!
//! 1. Install logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (defaults, then `ZETA_*` environment)
//! 3. Connect to Electrum servers and merge them into one quorum source
//! 4. Open the header store for the configured backend
//! 5. Bootstrap, start the sync tasks and run until Ctrl+C

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use zeta_header_sync::{FileBackedKVStore, KeyValueStore};
use zeta_node::adapters::ElectrumClient;
use zeta_node::container::{NodeConfig, StorageBackend};
use zeta_node::runtime::{self, NodeRuntime};

/// Run the node over `kv` until Ctrl+C or a task failure.
async fn run<K: KeyValueStore + 'static>(
    config: &NodeConfig,
    kv: K,
    clients: Vec<Arc<ElectrumClient>>,
) -> Result<()> {
    let source = Arc::new(runtime::quorum_source(config, &clients));
    let node = NodeRuntime::new(config, kv, source).context("Failed to open header store")?;
    let mut supervisor = node.start().await.context("Failed to bootstrap")?;

    let ping_interval = Duration::from_secs(config.electrum.ping_interval_secs);
    let shutdown = supervisor.shutdown_signal();
    supervisor.spawn(
        "keepalive",
        runtime::keepalive(clients, ping_interval, shutdown),
    );

    info!("[zeta-node] Running. Press Ctrl+C to stop.");
    supervisor
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("[zeta-node] Failed to listen for Ctrl+C: {}", e);
            }
        })
        .await?;

    info!("[zeta-node] Shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::from_env()?;
    config.validate()?;

    info!("===========================================");
    info!("  Zeta Node v{}", env!("CARGO_PKG_VERSION"));
    info!("  Network: {}", config.sync.network);
    info!("  Store:   {}", config.store_path().display());
    info!("===========================================");

    let clients = runtime::connect_electrum(&config).await?;
    let path = config.store_path();

    match config.storage.backend {
        StorageBackend::File => {
            let kv = FileBackedKVStore::open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            run(&config, kv, clients).await
        }
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => {
            let kv = zeta_node::adapters::RocksDbStore::open_default(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            run(&config, kv, clients).await
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => {
            anyhow::bail!("RocksDB backend requested but zeta-node was built without the rocksdb feature")
        }
    }
}
