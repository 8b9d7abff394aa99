//! # Zeta Header Sync
//!
//! Follows a Bitcoin header chain from untrusted sources and keeps a
//! validated header graph.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! - Parse 80-byte headers and check them against their own compact target
//! - Link each header to its parent, tracking height and accumulated work
//! - Hold headers whose parent is unknown as floating and link them later
//! - Report the highest and heaviest tips, ties included
//! - Page through history and follow the live tip from one or more sources
//!
//! ## Security
//!
//! | Defense | Description |
//! |---------|-------------|
//! | Proof-of-work | Every header must meet the target its own `nbits` encodes |
//! | Checkpoints | Sync anchors on a trusted root with known height and work |
//! | Source quorum | Bulk pages and tips need agreement across sources |
//! | Atomic writes | A rejected batch leaves the store untouched |
//!
//! ## Module Structure
//!
//! ```text
//! zeta-header-sync/
//! ├── domain/          # Header, BlockHash, linkage, checkpoints, errors
//! ├── algorithms/      # Header codec, compact targets and work, quorum voting
//! ├── ports/           # API trait (inbound) + store and source traits (outbound)
//! ├── adapters/        # In-memory and file stores, quorum header source
//! ├── application/     # ChainGraphStore, HeaderSyncService, SyncSupervisor
//! └── config.rs        # HeaderSyncConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::{FileBackedKVStore, InMemoryKVStore, QuorumHeaderSource, QuorumSettings};
pub use algorithms::{
    check_work, decode_target, difficulty, double_sha256, header_work, network_difficulty,
    parse_header, parse_header_hex, select_most_common, split_headers, split_headers_hex,
    target_work,
};
pub use application::{ChainGraphStore, HeaderSyncService, SharedChainStore, SyncSupervisor};
pub use config::HeaderSyncConfig;
pub use domain::{
    BlockHash, BulkHeaders, CatchUpReport, Checkpoint, CheckpointSource, Header,
    HeaderInput, HeaderLinkage, HeaderNotification, HeaderSyncError, KVStoreError, Network,
    PowError, StoredHeader, TipHeader, TipStatus, HEADER_SIZE, MAINNET_CHECKPOINT_552955_HEX,
    MAINNET_GENESIS_HEX, MAINNET_POW_LIMIT_NBITS, REGTEST_GENESIS_HEX, REGTEST_POW_LIMIT_NBITS,
    TESTNET_GENESIS_HEX,
};
pub use ports::{
    BatchOperation, HeaderSource, HeaderSubscription, HeaderSyncApi, KeyValueStore,
    MockHeaderSource,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
