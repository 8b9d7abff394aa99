//! # Zeta Node Library
//!
//! Exposes the node's modules for testing. The entry point is the
//! `main.rs` binary.
//!
//! - `adapters/` - Electrum header source, RocksDB store
//! - `container/` - Node configuration and environment overrides
//! - `runtime` - Store, service and supervisor wiring

#![warn(missing_docs)]
#![allow(clippy::type_complexity)]

pub mod adapters;
pub mod container;
pub mod runtime;

pub use container::NodeConfig;
pub use runtime::NodeRuntime;
