//! # Adapter Implementations
//!
//! Concrete implementations of the header-sync outbound ports.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                  OUTER LAYER (Adapters)                      │
//! │   ElectrumClient (HeaderSource), RocksDbStore (KeyValueStore)│
//! └──────────────────────────────────────────────────────────────┘
//!                         ↑ implements ↑
//! ┌──────────────────────────────────────────────────────────────┐
//! │          zeta-header-sync ports (HeaderSource, KV store)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod electrum;
pub mod storage;

pub use electrum::ElectrumClient;
pub use storage::*;
