//! # Production Storage Adapters
//!
//! RocksDB backend for the header store, behind the `rocksdb` feature.
//! The single-file store from `zeta-header-sync` is always available.
//!
//! ```toml
//! zeta-node = { path = "...", features = ["rocksdb"] }
//! ```

#[cfg(feature = "rocksdb")]
pub mod rocksdb_adapter;

#[cfg(feature = "rocksdb")]
pub use rocksdb_adapter::{RocksDbConfig, RocksDbStore};

pub use zeta_header_sync::{FileBackedKVStore, InMemoryKVStore};
