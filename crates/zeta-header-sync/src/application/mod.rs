//! # Application Module
//!
//! The chain store plus the services and supervisor that drive it.

pub mod chain_store;
pub mod service;
pub mod supervisor;

pub use chain_store::{ChainGraphStore, SharedChainStore};
pub use service::HeaderSyncService;
pub use supervisor::SyncSupervisor;
