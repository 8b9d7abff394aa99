//! Quorum Header Source Adapter
//!
//! Implements `HeaderSource` on top of several other sources. Requests are
//! fanned out to a random subset and the most common answer wins;
//! subscriptions are merged so a notification is only forwarded once
//! enough sources have delivered it.

use async_trait::async_trait;
use futures::future::join_all;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::algorithms::select_most_common;
use crate::domain::{BulkHeaders, HeaderNotification, HeaderSyncError};
use crate::ports::outbound::{HeaderSource, HeaderSubscription};

/// Notifications remembered for agreement counting.
const SEEN_WINDOW: usize = 1024;

/// Quorum settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuorumSettings {
    /// Sources asked per request.
    pub fanout: usize,
    /// Sources that must deliver a notification before it is forwarded.
    pub min_agreement: usize,
    /// Per-source request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Capacity of the merged notification channel.
    pub buffer: usize,
}

impl Default for QuorumSettings {
    fn default() -> Self {
        Self {
            fanout: 3,
            min_agreement: 2,
            request_timeout_secs: 10,
            buffer: 256,
        }
    }
}

/// Header source that asks several sources and takes the majority answer.
pub struct QuorumHeaderSource<S: HeaderSource + ?Sized> {
    sources: Vec<Arc<S>>,
    settings: QuorumSettings,
    id: String,
}

impl<S: HeaderSource + ?Sized + 'static> QuorumHeaderSource<S> {
    /// Wrap `sources`.
    pub fn new(sources: Vec<Arc<S>>, settings: QuorumSettings) -> Self {
        let id = format!("quorum({})", sources.len());
        Self {
            sources,
            settings,
            id,
        }
    }

    /// Number of wrapped sources.
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    fn pick(&self) -> Vec<Arc<S>> {
        let k = self.settings.fanout.clamp(1, self.sources.len().max(1));
        self.sources
            .choose_multiple(&mut rand::thread_rng(), k)
            .cloned()
            .collect()
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }
}

#[async_trait]
impl<S: HeaderSource + ?Sized + 'static> HeaderSource for QuorumHeaderSource<S> {
    async fn fetch_headers(
        &self,
        start_height: u64,
        count: u64,
    ) -> Result<BulkHeaders, HeaderSyncError> {
        let picked = self.pick();
        let timeout = self.timeout();

        let results = join_all(picked.iter().map(|source| async move {
            match tokio::time::timeout(timeout, source.fetch_headers(start_height, count)).await {
                Ok(Ok(page)) => Some(page),
                Ok(Err(e)) => {
                    debug!("[zeta-sync] {} failed fetch: {}", source.source_id(), e);
                    None
                }
                Err(_) => {
                    debug!("[zeta-sync] {} timed out", source.source_id());
                    None
                }
            }
        }))
        .await;

        let answers: Vec<BulkHeaders> = results.into_iter().flatten().collect();
        if answers.len() < picked.len() {
            warn!(
                "[zeta-sync] Only {}/{} sources answered fetch at {}",
                answers.len(),
                picked.len(),
                start_height
            );
        }

        select_most_common(&answers).ok_or_else(|| {
            HeaderSyncError::Network(format!("no source answered fetch at {}", start_height))
        })
    }

    async fn subscribe_headers(&self) -> Result<HeaderSubscription, HeaderSyncError> {
        let picked = self.pick();
        let timeout = self.timeout();

        let results = join_all(picked.iter().map(|source| async move {
            match tokio::time::timeout(timeout, source.subscribe_headers()).await {
                Ok(Ok(sub)) => Some(sub),
                Ok(Err(e)) => {
                    debug!("[zeta-sync] {} failed subscribe: {}", source.source_id(), e);
                    None
                }
                Err(_) => None,
            }
        }))
        .await;

        let subscriptions: Vec<HeaderSubscription> = results.into_iter().flatten().collect();
        let initials: Vec<HeaderNotification> =
            subscriptions.iter().map(|s| s.initial.clone()).collect();
        let initial = select_most_common(&initials)
            .ok_or_else(|| HeaderSyncError::Network("no source accepted subscription".into()))?;

        let required = self.settings.min_agreement.clamp(1, subscriptions.len());
        if required < self.settings.min_agreement {
            warn!(
                "[zeta-sync] Only {} subscriptions live; forwarding after {} sightings",
                subscriptions.len(),
                required
            );
        }
        info!(
            "[zeta-sync] Merged {} subscriptions (agreement {})",
            subscriptions.len(),
            required
        );

        let (merged_tx, merged_rx) = mpsc::channel(self.settings.buffer.max(1));
        let (tagged_tx, tagged_rx) = mpsc::channel(self.settings.buffer.max(1));

        for (index, sub) in subscriptions.into_iter().enumerate() {
            let tagged_tx = tagged_tx.clone();
            let mut receiver = sub.receiver;
            tokio::spawn(async move {
                while let Some(notification) = receiver.recv().await {
                    if tagged_tx.send((index, notification)).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(tagged_tx);

        tokio::spawn(merge_notifications(tagged_rx, merged_tx, required));

        Ok(HeaderSubscription {
            initial,
            receiver: merged_rx,
        })
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}

/// Forward each notification once `required` distinct sources delivered it.
async fn merge_notifications(
    mut tagged: mpsc::Receiver<(usize, HeaderNotification)>,
    merged: mpsc::Sender<HeaderNotification>,
    required: usize,
) {
    let mut sightings: HashMap<HeaderNotification, HashSet<usize>> = HashMap::new();
    let mut forwarded: HashSet<HeaderNotification> = HashSet::new();
    let mut order: VecDeque<HeaderNotification> = VecDeque::new();

    while let Some((index, notification)) = tagged.recv().await {
        if forwarded.contains(&notification) {
            continue;
        }

        let seen_by = sightings.entry(notification.clone()).or_insert_with(|| {
            order.push_back(notification.clone());
            HashSet::new()
        });
        seen_by.insert(index);

        if seen_by.len() >= required {
            sightings.remove(&notification);
            forwarded.insert(notification.clone());
            if merged.send(notification).await.is_err() {
                break;
            }
        }

        while order.len() > SEEN_WINDOW {
            if let Some(old) = order.pop_front() {
                sightings.remove(&old);
                forwarded.remove(&old);
            }
        }
    }
}
