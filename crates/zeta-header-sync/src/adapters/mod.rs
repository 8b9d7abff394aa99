//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements outbound port traits: key-value stores and the quorum
//! header source.

mod quorum_source;
pub mod storage;

pub use quorum_source::{QuorumHeaderSource, QuorumSettings};
pub use storage::{FileBackedKVStore, InMemoryKVStore};
