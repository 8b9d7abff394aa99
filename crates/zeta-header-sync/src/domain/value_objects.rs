//! # Domain Value Objects
//!
//! Immutable value types exchanged between the store, the sync service and
//! the header source.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use super::entities::{BlockHash, Header};

/// Checkpoint source type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CheckpointSource {
    /// The network's genesis header.
    Genesis,
    /// Built-in hardcoded checkpoint.
    Hardcoded,
    /// Supplied by the operator (e.g. configuration).
    External {
        /// Source identifier
        source: String,
    },
}

/// Trusted header injected as the base of the stored chain.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    /// Height the header is anchored at.
    pub height: u64,
    /// Serialized 80-byte header as hex.
    pub header_hex: String,
    /// Known cumulative chain work through this header, if any.
    /// When absent the root carries only its own work.
    pub chain_work: Option<BigUint>,
    /// Where this checkpoint came from.
    pub source: CheckpointSource,
}

impl Checkpoint {
    /// Create a hardcoded checkpoint.
    pub fn hardcoded(height: u64, header_hex: impl Into<String>) -> Self {
        Self {
            height,
            header_hex: header_hex.into(),
            chain_work: None,
            source: CheckpointSource::Hardcoded,
        }
    }

    /// Create a genesis checkpoint.
    pub fn genesis(header_hex: impl Into<String>) -> Self {
        Self {
            height: 0,
            header_hex: header_hex.into(),
            chain_work: None,
            source: CheckpointSource::Genesis,
        }
    }

    /// Attach a known cumulative chain work.
    pub fn with_chain_work(mut self, chain_work: BigUint) -> Self {
        self.chain_work = Some(chain_work);
        self
    }
}

/// Anything the store accepts as a header.
#[derive(Clone, Debug)]
pub enum HeaderInput {
    /// Already parsed header.
    Parsed(Header),
    /// Raw 80 bytes.
    Raw(Vec<u8>),
    /// 160 hex characters.
    Hex(String),
}

impl From<Header> for HeaderInput {
    fn from(header: Header) -> Self {
        HeaderInput::Parsed(header)
    }
}

impl From<Vec<u8>> for HeaderInput {
    fn from(raw: Vec<u8>) -> Self {
        HeaderInput::Raw(raw)
    }
}

impl From<&[u8]> for HeaderInput {
    fn from(raw: &[u8]) -> Self {
        HeaderInput::Raw(raw.to_vec())
    }
}

impl From<String> for HeaderInput {
    fn from(hex: String) -> Self {
        HeaderInput::Hex(hex)
    }
}

impl From<&str> for HeaderInput {
    fn from(hex: &str) -> Self {
        HeaderInput::Hex(hex.to_string())
    }
}

/// Response to a bulk header fetch.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkHeaders {
    /// Number of headers in `hex`.
    pub count: u64,
    /// Concatenated raw headers.
    pub hex: String,
    /// Maximum number of headers the server returns per request.
    pub max: u64,
}

/// A single header pushed by a subscription.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TipHeader {
    /// Serialized header as hex.
    pub hex: String,
    /// Height claimed by the server. Informational only.
    pub height: u64,
}

/// Header subscription event.
///
/// The initial subscription result is a single object while later
/// notifications arrive as a parameter list.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum HeaderNotification {
    /// List of headers.
    Batch(Vec<TipHeader>),
    /// One header.
    Single(TipHeader),
}

impl HeaderNotification {
    /// Headers carried by this notification, in delivery order.
    pub fn headers(&self) -> &[TipHeader] {
        match self {
            HeaderNotification::Batch(headers) => headers,
            HeaderNotification::Single(header) => std::slice::from_ref(header),
        }
    }
}

/// Current best tip as seen by the status reporter.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TipStatus {
    /// Hash of the heaviest header.
    pub hash: BlockHash,
    /// Its height.
    pub height: u64,
    /// Its cumulative work.
    pub accumulated_work: BigUint,
    /// How many headers share that work.
    pub competing_tips: usize,
}

/// Outcome of a catch-up run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    /// Pages requested from the source.
    pub pages_fetched: u64,
    /// Pages whose batch was rejected by the store.
    pub pages_rejected: u64,
    /// Headers received across all pages.
    pub headers_received: u64,
    /// Height the last page started at.
    pub last_start_height: u64,
    /// Start height of the first rejected page, if any.
    pub first_rejected_height: Option<u64>,
}
