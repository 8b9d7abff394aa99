//! # Header Sync Configuration
//!
//! Configuration for the header sync service.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::{HeaderSyncError, Network};

/// Header sync configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HeaderSyncConfig {
    /// Network to follow.
    pub network: Network,

    /// Headers requested per catch-up page.
    pub page_size: u64,

    /// Headers re-requested at the start of each following page so
    /// consecutive pages overlap.
    pub page_overlap: u64,

    /// Seconds between catch-up passes. Each pass resumes below any gap
    /// left by the previous one.
    pub catch_up_interval_secs: u64,

    /// Seconds between floating-header repair passes.
    pub repair_interval_secs: u64,

    /// Seconds between tip status reports.
    pub status_interval_secs: u64,

    /// Capacity of the subscription notification channel.
    pub subscription_buffer: usize,
}

impl Default for HeaderSyncConfig {
    fn default() -> Self {
        Self {
            network: Network::Mainnet,
            page_size: 2016,
            page_overlap: 2,
            catch_up_interval_secs: 300,
            repair_interval_secs: 60,
            status_interval_secs: 10,
            subscription_buffer: 256,
        }
    }
}

impl HeaderSyncConfig {
    /// Create a config for testing (regtest, small pages, short intervals).
    pub fn for_testing() -> Self {
        Self {
            network: Network::Regtest,
            page_size: 10,
            page_overlap: 2,
            catch_up_interval_secs: 1,
            repair_interval_secs: 1,
            status_interval_secs: 1,
            subscription_buffer: 16,
        }
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), HeaderSyncError> {
        if self.page_size == 0 {
            return Err(HeaderSyncError::Config("page_size must be non-zero".into()));
        }
        if self.page_overlap >= self.page_size {
            return Err(HeaderSyncError::Config(format!(
                "page_overlap ({}) must be less than page_size ({})",
                self.page_overlap, self.page_size
            )));
        }
        if self.catch_up_interval_secs == 0
            || self.repair_interval_secs == 0
            || self.status_interval_secs == 0
        {
            return Err(HeaderSyncError::Config("intervals must be non-zero".into()));
        }
        if self.subscription_buffer == 0 {
            return Err(HeaderSyncError::Config(
                "subscription_buffer must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Catch-up interval as a `Duration`.
    pub fn catch_up_interval(&self) -> Duration {
        Duration::from_secs(self.catch_up_interval_secs)
    }

    /// Repair interval as a `Duration`.
    pub fn repair_interval(&self) -> Duration {
        Duration::from_secs(self.repair_interval_secs)
    }

    /// Status interval as a `Duration`.
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}
