//! # Header Sync Service
//!
//! Drives the chain store from a header source: bootstrap from a
//! checkpoint, page through history, follow the live tip, repair floating
//! headers and report the best tip.
//!
//! The store mutex is only ever taken inside synchronous sections; no
//! guard is held across an await.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::algorithms::{network_difficulty, split_headers_hex};
use crate::application::chain_store::SharedChainStore;
use crate::config::HeaderSyncConfig;
use crate::domain::{CatchUpReport, Checkpoint, HeaderNotification, HeaderSyncError, TipStatus};
use crate::ports::{HeaderSource, HeaderSyncApi, KeyValueStore};

/// Header Sync Service - orchestrates catch-up, live tip and repair.
pub struct HeaderSyncService<S: HeaderSource + ?Sized, K: KeyValueStore> {
    /// Configuration.
    config: HeaderSyncConfig,
    /// Chain store shared with every task.
    store: SharedChainStore<K>,
    /// Where headers come from.
    source: Arc<S>,
    /// Latest reported best tip.
    tip_tx: watch::Sender<Option<TipStatus>>,
}

impl<S, K> HeaderSyncService<S, K>
where
    S: HeaderSource + ?Sized + 'static,
    K: KeyValueStore + 'static,
{
    /// Create a new header sync service.
    pub fn new(config: HeaderSyncConfig, store: SharedChainStore<K>, source: Arc<S>) -> Self {
        let (tip_tx, _) = watch::channel(None);
        Self {
            config,
            store,
            source,
            tip_tx,
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &HeaderSyncConfig {
        &self.config
    }

    /// Shared store handle.
    pub fn store(&self) -> &SharedChainStore<K> {
        &self.store
    }

    /// Receive a `TipStatus` whenever the status reporter sees a new best
    /// tip.
    pub fn subscribe_tips(&self) -> watch::Receiver<Option<TipStatus>> {
        self.tip_tx.subscribe()
    }

    /// Store the headers of one catch-up page. `false` if rejected.
    fn store_page(&self, start_height: u64, hex: &str) -> bool {
        let headers = match split_headers_hex(hex) {
            Ok(headers) => headers,
            Err(e) => {
                warn!("[zeta-sync] Page at {} unreadable: {}", start_height, e);
                return false;
            }
        };
        self.store.lock().batch_store(headers)
    }

    /// Run [`HeaderSyncApi::catch_up`] every `catch_up_interval` until
    /// shutdown.
    ///
    /// The first pass starts at `from_height`. Later passes start at the
    /// first rejected page or the highest linked height, so a rejected page
    /// or a tip that skipped heights is fetched again.
    pub async fn run_catch_up(
        &self,
        from_height: u64,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), HeaderSyncError> {
        let mut interval = tokio::time::interval(self.config.catch_up_interval());
        let mut start = from_height;
        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = interval.tick() => {}
            }

            let report = tokio::select! {
                result = self.catch_up(start) => result?,
                _ = shutdown.changed() => {
                    info!("[zeta-sync] Catch-up interrupted by shutdown");
                    return Ok(());
                }
            };
            info!(
                "[zeta-sync] Catch-up from {} done: {} pages, {} headers, {} rejected pages",
                start, report.pages_fetched, report.headers_received, report.pages_rejected
            );
            start = self.resume_height(&report, start);
        }
    }

    /// Where the next catch-up pass starts: the first rejected page or the
    /// highest linked height, whichever is lower.
    ///
    /// Starting at the highest linked header re-fetches everything above
    /// it, which fills any hole under a floating tip.
    fn resume_height(&self, report: &CatchUpReport, last_start: u64) -> u64 {
        let highest = self
            .store
            .lock()
            .find_highest()
            .first()
            .and_then(|tip| tip.height())
            .unwrap_or(last_start);
        report
            .first_rejected_height
            .map_or(highest, |rejected| rejected.min(highest))
    }

    /// Follow the source's live tip until shutdown.
    ///
    /// A closed subscription is an error: the supervisor decides what to
    /// do about a dead source.
    pub async fn run_live_tip(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), HeaderSyncError> {
        let mut subscription = self.source.subscribe_headers().await?;
        info!(
            "[zeta-sync] Subscribed to headers from {}",
            self.source.source_id()
        );
        self.handle_notification(&subscription.initial);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    info!("[zeta-sync] Live tip shutting down");
                    return Ok(());
                }
                received = subscription.receiver.recv() => match received {
                    Some(notification) => {
                        self.handle_notification(&notification);
                    }
                    None => {
                        return Err(HeaderSyncError::Network(format!(
                            "subscription to {} closed",
                            self.source.source_id()
                        )));
                    }
                }
            }
        }
    }

    /// Repair floating headers every `repair_interval` until shutdown.
    pub async fn run_repair_loop(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), HeaderSyncError> {
        let mut interval = tokio::time::interval(self.config.repair_interval());
        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = interval.tick() => {
                    self.repair();
                }
            }
        }
    }

    /// Log and publish the best tip every `status_interval` until shutdown.
    pub async fn run_status_reporter(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), HeaderSyncError> {
        let mut interval = tokio::time::interval(self.config.status_interval());
        let mut last_height: Option<u64> = None;
        loop {
            tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                _ = interval.tick() => {
                    last_height = self.report_status(last_height).or(last_height);
                }
            }
        }
    }

    /// One status report. Returns the reported height.
    fn report_status(&self, last_height: Option<u64>) -> Option<u64> {
        let Some(status) = self.best_tip() else {
            info!("[zeta-sync] No linked headers yet");
            return None;
        };

        let delta = last_height.map_or(0, |h| status.height as i64 - h as i64);
        let difficulty = self
            .store
            .lock()
            .find_by_hash(&status.hash)
            .map_or(0.0, |tip| network_difficulty(tip.header.nbits, self.config.network));
        info!(
            "[zeta-sync] Tip {} height {} work {} difficulty {:.3} ({:+} since last report, {} competing)",
            status.hash,
            status.height,
            status.accumulated_work,
            difficulty,
            delta,
            status.competing_tips
        );

        let height = status.height;
        self.tip_tx.send_if_modified(|current| {
            if current.as_ref() == Some(&status) {
                return false;
            }
            *current = Some(status);
            true
        });
        Some(height)
    }
}

#[async_trait]
impl<S, K> HeaderSyncApi for HeaderSyncService<S, K>
where
    S: HeaderSource + ?Sized + 'static,
    K: KeyValueStore + 'static,
{
    async fn bootstrap(&self, checkpoint: &Checkpoint) -> Result<u64, HeaderSyncError> {
        let mut store = self.store.lock();
        store.try_store_checkpoint(
            checkpoint.header_hex.as_str(),
            checkpoint.height,
            checkpoint.chain_work.clone(),
        )?;

        let start = store
            .try_find_highest()?
            .first()
            .and_then(|tip| tip.height())
            .unwrap_or(checkpoint.height)
            .max(checkpoint.height);
        info!(
            "[zeta-sync] Bootstrapped at height {} ({:?}), catch-up from {}",
            checkpoint.height, checkpoint.source, start
        );
        Ok(start)
    }

    async fn catch_up(&self, from_height: u64) -> Result<CatchUpReport, HeaderSyncError> {
        let page_size = self.config.page_size;
        let overlap = self.config.page_overlap;
        let mut report = CatchUpReport::default();
        let mut start = from_height;

        loop {
            let page = self.source.fetch_headers(start, page_size).await?;
            report.pages_fetched += 1;
            report.headers_received += page.count;
            report.last_start_height = start;

            let page_len = if page.max == 0 {
                page_size
            } else {
                page_size.min(page.max)
            };

            if !self.store_page(start, &page.hex) {
                report.pages_rejected += 1;
                report.first_rejected_height.get_or_insert(start);
                warn!(
                    "[zeta-sync] Rejected page of {} headers at {}",
                    page.count, start
                );
            } else {
                debug!("[zeta-sync] Stored {} headers at {}", page.count, start);
            }

            if page.count < page_len {
                break;
            }
            start += page_len.saturating_sub(overlap).max(1);
        }

        Ok(report)
    }

    fn handle_notification(&self, notification: &HeaderNotification) -> usize {
        let mut accepted = 0;
        for tip in notification.headers() {
            if self.store.lock().store(tip.hex.as_str()) {
                accepted += 1;
                debug!("[zeta-sync] Accepted tip at claimed height {}", tip.height);
            } else {
                debug!("[zeta-sync] Ignored tip at claimed height {}", tip.height);
            }
        }
        accepted
    }

    fn repair(&self) -> usize {
        let repaired = self.store.lock().repair_floating();
        if repaired > 0 {
            info!("[zeta-sync] Linked {} floating headers", repaired);
        }
        repaired
    }

    fn best_tip(&self) -> Option<TipStatus> {
        let heaviest = self.store.lock().find_heaviest();
        let best = heaviest.first()?;
        Some(TipStatus {
            hash: best.hash(),
            height: best.height()?,
            accumulated_work: best.accumulated_work(),
            competing_tips: heaviest.len(),
        })
    }
}
