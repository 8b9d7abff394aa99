//! # Domain Errors
//!
//! Error types for header sync.
//!
//! Validation failures are surfaced as `Result`s by the codec and the
//! `try_*` store operations. The boolean store contract converts them at the
//! store boundary.

use thiserror::Error;

use super::entities::BlockHash;

/// Header sync error types.
#[derive(Debug, Error)]
pub enum HeaderSyncError {
    /// Input is not a well-formed 80-byte header (or a whole number of them).
    #[error("Invalid header received: {0}")]
    MalformedHeader(String),

    /// Header hash does not satisfy the target claimed by its nbits.
    #[error("Insufficient proof of work for header {hash}")]
    ProofOfWork {
        /// Hash of the rejected header
        hash: BlockHash,
    },

    /// A different root is already anchored at this height.
    #[error("Conflicting root at height {height}")]
    RootConflict {
        /// Height of the existing root
        height: u64,
    },

    /// Underlying key-value store failed.
    #[error("Storage error: {0}")]
    Storage(#[from] KVStoreError),

    /// Stored record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Header source (network collaborator) failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration rejected by `validate()`.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A supervised background task failed or panicked.
    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

impl From<bincode::Error> for HeaderSyncError {
    fn from(err: bincode::Error) -> Self {
        HeaderSyncError::Serialization(err.to_string())
    }
}

/// Compact target decoding failures.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum PowError {
    /// Mantissa sign bit set with a non-zero mantissa.
    #[error("nbits encodes a negative target")]
    NegativeTarget,

    /// Decoded target does not fit in 256 bits.
    #[error("nbits target overflows 256 bits")]
    TargetOverflow,

    /// Decoded target is zero; no hash can satisfy it.
    #[error("nbits encodes a zero target")]
    ZeroTarget,
}

/// Key-value store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O failure in the backing store.
    #[error("I/O error: {message}")]
    IOError {
        /// Backend message
        message: String,
    },

    /// Backend reported corrupted data.
    #[error("Corruption: {message}")]
    Corruption {
        /// Backend message
        message: String,
    },
}
