//! # Inbound Ports
//!
//! API trait defining what the header sync engine can do.

use async_trait::async_trait;

use crate::domain::{CatchUpReport, Checkpoint, HeaderNotification, HeaderSyncError, TipStatus};

/// Header sync API - inbound port.
#[async_trait]
pub trait HeaderSyncApi: Send + Sync {
    /// Seed the store with a trusted root.
    ///
    /// Returns the height catch-up should start from.
    async fn bootstrap(&self, checkpoint: &Checkpoint) -> Result<u64, HeaderSyncError>;

    /// Page through history from `from_height` until a partial page.
    async fn catch_up(&self, from_height: u64) -> Result<CatchUpReport, HeaderSyncError>;

    /// Store every header in a live notification.
    ///
    /// Returns how many were accepted.
    fn handle_notification(&self, notification: &HeaderNotification) -> usize;

    /// Link floating headers whose parents have arrived.
    fn repair(&self) -> usize;

    /// Heaviest known tip, if any.
    fn best_tip(&self) -> Option<TipStatus>;
}
