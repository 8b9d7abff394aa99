//! # Outbound Ports
//!
//! Traits for external dependencies: the key-value store behind the chain
//! graph, and the network source of headers.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::domain::{BulkHeaders, HeaderNotification, HeaderSyncError, KVStoreError, TipHeader};

/// Key/value pairs returned by a prefix scan, in key order.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for key-value database operations.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write.
    ///
    /// Either all operations are applied or none are.
    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// All entries whose key starts with `prefix`, in key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    /// Put a key-value pair.
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Delete a key.
    Delete {
        /// Key
        key: Vec<u8>,
    },
}

impl BatchOperation {
    /// Create a Put operation.
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete operation.
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// A live header subscription.
#[derive(Debug)]
pub struct HeaderSubscription {
    /// Tip reported when the subscription was made.
    pub initial: HeaderNotification,
    /// Later notifications. Closed when the source goes away.
    pub receiver: mpsc::Receiver<HeaderNotification>,
}

/// Source of headers - outbound port.
///
/// Implemented by the Electrum client in the node binary and by
/// [`crate::adapters::QuorumHeaderSource`].
#[async_trait]
pub trait HeaderSource: Send + Sync {
    /// Up to `count` headers starting at `start_height`.
    async fn fetch_headers(
        &self,
        start_height: u64,
        count: u64,
    ) -> Result<BulkHeaders, HeaderSyncError>;

    /// Subscribe to new tips.
    async fn subscribe_headers(&self) -> Result<HeaderSubscription, HeaderSyncError>;

    /// Source identifier (for logging).
    fn source_id(&self) -> &str;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// Mock header source serving a fixed chain.
///
/// Clones share state, so a test can keep a handle to inspect requests and
/// push notifications after handing the source to a service.
#[derive(Clone)]
pub struct MockHeaderSource {
    /// Source identifier.
    pub id: String,
    /// Height of `headers[0]`.
    pub base_height: u64,
    /// Served headers as hex, in height order.
    pub headers: Vec<String>,
    /// Server page cap reported as `max`.
    pub max: u64,
    /// Should return errors?
    pub should_fail: bool,
    requests: Arc<Mutex<Vec<(u64, u64)>>>,
    subscribers: Arc<Mutex<Vec<mpsc::Sender<HeaderNotification>>>>,
}

impl Default for MockHeaderSource {
    fn default() -> Self {
        Self {
            id: "mock-source-1".to_string(),
            base_height: 0,
            headers: Vec::new(),
            max: 2016,
            should_fail: false,
            requests: Arc::new(Mutex::new(Vec::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl MockHeaderSource {
    /// Serve `headers` with the first one at `base_height`.
    pub fn with_headers(base_height: u64, headers: Vec<String>) -> Self {
        Self {
            base_height,
            headers,
            ..Default::default()
        }
    }

    /// A source whose every request fails.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Default::default()
        }
    }

    /// Rename the source.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Report `max` as the server page cap.
    pub fn with_max(mut self, max: u64) -> Self {
        self.max = max;
        self
    }

    /// Make every request fail.
    pub fn fail(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Every `(start_height, count)` requested so far.
    pub fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().clone()
    }

    /// Deliver a notification to every live subscriber.
    ///
    /// Returns how many subscribers received it.
    pub fn push(&self, notification: HeaderNotification) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| !tx.is_closed());
        subscribers
            .iter()
            .filter(|tx| tx.try_send(notification.clone()).is_ok())
            .count()
    }

    /// Drop every subscriber sender, closing their receivers.
    pub fn close_subscriptions(&self) {
        self.subscribers.lock().clear();
    }

    fn tip(&self) -> HeaderNotification {
        let (hex, height) = match self.headers.last() {
            Some(hex) => (hex.clone(), self.base_height + self.headers.len() as u64 - 1),
            None => (String::new(), self.base_height),
        };
        HeaderNotification::Single(TipHeader { hex, height })
    }
}

#[async_trait]
impl HeaderSource for MockHeaderSource {
    async fn fetch_headers(
        &self,
        start_height: u64,
        count: u64,
    ) -> Result<BulkHeaders, HeaderSyncError> {
        self.requests.lock().push((start_height, count));

        if self.should_fail {
            return Err(HeaderSyncError::Network("Mock failure".to_string()));
        }

        let page_len = count.min(self.max) as usize;
        let start = start_height.saturating_sub(self.base_height) as usize;
        let served: Vec<&String> = if start_height < self.base_height {
            Vec::new()
        } else {
            self.headers.iter().skip(start).take(page_len).collect()
        };

        Ok(BulkHeaders {
            count: served.len() as u64,
            hex: served.into_iter().map(String::as_str).collect(),
            max: self.max,
        })
    }

    async fn subscribe_headers(&self) -> Result<HeaderSubscription, HeaderSyncError> {
        if self.should_fail {
            return Err(HeaderSyncError::Network("Mock failure".to_string()));
        }

        let (tx, receiver) = mpsc::channel(64);
        self.subscribers.lock().push(tx);
        Ok(HeaderSubscription {
            initial: self.tip(),
            receiver,
        })
    }

    fn source_id(&self) -> &str {
        &self.id
    }
}
