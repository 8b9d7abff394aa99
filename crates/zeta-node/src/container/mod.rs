//! # Node Container
//!
//! Configuration for everything the node wires together.

pub mod config;

pub use config::{default_servers, ConfigError, ElectrumConfig, NodeConfig, StorageBackend, StorageConfig};
