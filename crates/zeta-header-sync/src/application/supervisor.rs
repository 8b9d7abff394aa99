//! # Sync Supervisor
//!
//! Owns the long-running sync tasks. A task that fails or panics brings the
//! others down and is reported to the caller instead of dying quietly.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::application::service::HeaderSyncService;
use crate::domain::HeaderSyncError;
use crate::ports::{HeaderSource, KeyValueStore};

type TaskResult = (&'static str, Result<(), HeaderSyncError>);

/// Supervises catch-up, live tip, repair and status tasks.
pub struct SyncSupervisor<S: HeaderSource + ?Sized, K: KeyValueStore> {
    service: Arc<HeaderSyncService<S, K>>,
    tasks: JoinSet<TaskResult>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<S, K> SyncSupervisor<S, K>
where
    S: HeaderSource + ?Sized + 'static,
    K: KeyValueStore + 'static,
{
    /// Create a supervisor for `service`. Nothing runs until [`Self::start`].
    pub fn new(service: Arc<HeaderSyncService<S, K>>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            service,
            tasks: JoinSet::new(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Supervised service.
    pub fn service(&self) -> &Arc<HeaderSyncService<S, K>> {
        &self.service
    }

    /// Number of tasks still running.
    pub fn running(&self) -> usize {
        self.tasks.len()
    }

    /// Spawn every sync task; catch-up starts at `from_height`.
    pub fn start(&mut self, from_height: u64) {
        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown_rx.clone();
        self.spawn("catch-up", async move {
            service.run_catch_up(from_height, shutdown).await
        });

        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown_rx.clone();
        self.spawn("live-tip", async move { service.run_live_tip(shutdown).await });

        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown_rx.clone();
        self.spawn("repair", async move { service.run_repair_loop(shutdown).await });

        let service = Arc::clone(&self.service);
        let shutdown = self.shutdown_rx.clone();
        self.spawn("status", async move {
            service.run_status_reporter(shutdown).await
        });

        info!("[zeta-sync] Started {} sync tasks", self.tasks.len());
    }

    /// Spawn an extra supervised task.
    pub fn spawn<F>(&mut self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), HeaderSyncError>> + Send + 'static,
    {
        self.tasks.spawn(async move { (name, task.await) });
    }

    /// A receiver that flips to `true` on shutdown, for extra tasks.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_rx.clone()
    }

    /// Run until `signal` resolves or a task fails, then stop every task.
    ///
    /// Tasks that finish cleanly are not failures. The first failure or
    /// panic is returned after all tasks have stopped.
    pub async fn run_until<F>(mut self, signal: F) -> Result<(), HeaderSyncError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(signal);
        let mut failure = None;

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("[zeta-sync] Shutdown requested");
                    break;
                }
                joined = self.tasks.join_next() => match joined {
                    None => break,
                    Some(Ok((name, Ok(())))) => {
                        info!("[zeta-sync] Task {} finished", name);
                    }
                    Some(Ok((name, Err(e)))) => {
                        error!("[zeta-sync] Task {} failed: {}", name, e);
                        failure = Some(HeaderSyncError::TaskFailed(format!("{}: {}", name, e)));
                        break;
                    }
                    Some(Err(join_error)) => {
                        error!("[zeta-sync] Task panicked: {}", join_error);
                        failure = Some(HeaderSyncError::TaskFailed(join_error.to_string()));
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.shutdown_tx.send(true) {
            warn!("[zeta-sync] Failed to send shutdown signal: {}", e);
        }
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((name, Err(e))) => warn!("[zeta-sync] Task {} stopped with: {}", name, e),
                Ok((name, Ok(()))) => info!("[zeta-sync] Task {} stopped", name),
                Err(join_error) => warn!("[zeta-sync] Task ended abnormally: {}", join_error),
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryKVStore;
    use crate::application::chain_store::ChainGraphStore;
    use crate::config::HeaderSyncConfig;
    use crate::domain::KVStoreError;
    use crate::ports::inbound::HeaderSyncApi;
    use crate::ports::outbound::ScanResult;
    use crate::ports::{BatchOperation, KeyValueStore, MockHeaderSource};
    use crate::test_utils::*;
    use std::time::Duration;

    /// In-memory store whose first `failures` batch writes fail.
    struct FlakyKV {
        inner: InMemoryKVStore,
        failures: usize,
    }

    impl KeyValueStore for FlakyKV {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
            self.inner.get(key)
        }
        fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
            self.inner.put(key, value)
        }
        fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
            self.inner.delete(key)
        }
        fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(KVStoreError::IOError {
                    message: "device busy".to_string(),
                });
            }
            self.inner.atomic_batch_write(operations)
        }
        fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
            self.inner.exists(key)
        }
        fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
            self.inner.prefix_scan(prefix)
        }
    }

    fn supervisor(source: MockHeaderSource) -> SyncSupervisor<MockHeaderSource, InMemoryKVStore> {
        let store = ChainGraphStore::open(InMemoryKVStore::new())
            .unwrap()
            .into_shared();
        let service = HeaderSyncService::new(HeaderSyncConfig::for_testing(), store, Arc::new(source));
        SyncSupervisor::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_run_until_signal_stops_tasks() {
        let genesis = regtest_genesis();
        let mut chain = vec![genesis.clone()];
        chain.extend(mine_chain(&genesis.hash, 4, EASY_NBITS, 1));
        let source = MockHeaderSource::with_headers(0, hex_list(&chain));

        let mut sup = supervisor(source);
        let service = Arc::clone(sup.service());
        sup.start(0);
        assert_eq!(sup.running(), 4);

        let result = sup
            .run_until(tokio::time::sleep(Duration::from_millis(100)))
            .await;
        assert!(result.is_ok());
        assert_eq!(service.store().lock().len(), 5);
    }

    #[tokio::test]
    async fn test_failing_task_is_reported() {
        let source = MockHeaderSource::failing();
        let mut sup = supervisor(source);
        sup.start(0);

        let result = sup.run_until(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(HeaderSyncError::TaskFailed(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_page_is_fetched_again() {
        let genesis = regtest_genesis();
        let mut chain = vec![genesis.clone()];
        chain.extend(mine_chain(&genesis.hash, 24, EASY_NBITS, 1));
        let source = MockHeaderSource::with_headers(0, hex_list(&chain));

        let kv = FlakyKV {
            inner: InMemoryKVStore::new(),
            failures: 1,
        };
        let store = ChainGraphStore::open(kv).unwrap().into_shared();
        let service = Arc::new(HeaderSyncService::new(
            HeaderSyncConfig::for_testing(),
            store,
            Arc::new(source.clone()),
        ));

        let mut sup = SyncSupervisor::new(Arc::clone(&service));
        let (svc, shutdown) = (Arc::clone(&service), sup.shutdown_signal());
        sup.spawn("catch-up", async move { svc.run_catch_up(0, shutdown).await });
        let (svc, shutdown) = (Arc::clone(&service), sup.shutdown_signal());
        sup.spawn("repair", async move { svc.run_repair_loop(shutdown).await });

        let watched = Arc::clone(&service);
        let synced = async move {
            for _ in 0..600 {
                if watched.best_tip().map(|tip| tip.height) == Some(24) {
                    return;
                }
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        };
        sup.run_until(synced).await.unwrap();

        let requests = source.requests();
        assert_eq!(requests[..3], [(0, 10), (8, 10), (16, 10)]);
        assert!(requests[3..].contains(&(0, 10)), "page 0 never retried: {:?}", requests);
        assert_eq!(service.best_tip().unwrap().hash, chain[24].hash);
        assert!(service.store().lock().find_floating().is_empty());
    }

    #[tokio::test]
    async fn test_panicking_task_is_reported() {
        let mut sup = supervisor(MockHeaderSource::default());
        let explode = true;
        sup.spawn("boom", async move {
            if explode {
                panic!("boom");
            }
            Ok(())
        });

        let result = sup.run_until(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(HeaderSyncError::TaskFailed(_))));
    }

    #[tokio::test]
    async fn test_extra_task_sees_shutdown() {
        let mut sup = supervisor(MockHeaderSource::default());
        let mut signal = sup.shutdown_signal();
        sup.spawn("waiter", async move {
            signal.changed().await.ok();
            Ok(())
        });

        let result = sup.run_until(async {}).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_no_tasks_returns_immediately() {
        let sup = supervisor(MockHeaderSource::default());
        assert!(sup.run_until(std::future::pending::<()>()).await.is_ok());
    }
}
