//! # Domain Entities
//!
//! Core entities for header sync: block hashes, parsed headers, and the
//! linkage state a stored header carries.

use num_bigint::BigUint;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of a serialized block header.
pub const HEADER_SIZE: usize = 80;

/// 32-byte block hash.
///
/// Bytes are kept in wire order (as produced by double-SHA256). `Display`
/// and `FromStr` use the conventional byte-reversed hex form.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    /// All-zero hash; the parent of a genesis header.
    pub const ZERO: BlockHash = BlockHash([0u8; 32]);

    /// Wrap bytes given in wire order.
    pub const fn from_wire_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Bytes in wire order.
    pub fn as_wire_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Is this the all-zero hash?
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = self.0;
        display.reverse();
        f.write_str(&hex::encode(display))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", self)
    }
}

impl FromStr for BlockHash {
    type Err = hex::FromHexError;

    /// Parse the display (byte-reversed) hex form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        bytes.reverse();
        Ok(Self(bytes))
    }
}

/// Parsed 80-byte block header.
///
/// Built by [`crate::algorithms::codec::parse_header`]. `raw` is the
/// canonical encoding; every other field is derived from it.
#[derive(Clone, Debug, PartialEq)]
pub struct Header {
    /// Double-SHA256 of `raw`.
    pub hash: BlockHash,
    /// Protocol version bits.
    pub version: i32,
    /// Hash of the parent header.
    pub prev_block: BlockHash,
    /// Transaction commitment (not verified here).
    pub merkle_root: BlockHash,
    /// Miner-claimed timestamp, seconds since epoch.
    pub timestamp: u32,
    /// Compact target, wire byte order.
    pub nbits: [u8; 4],
    /// Mining nonce, wire byte order.
    pub nonce: [u8; 4],
    /// Difficulty relative to the mainnet proof-of-work limit. Display only;
    /// see [`crate::algorithms::network_difficulty`] for other networks.
    pub difficulty: f64,
    /// Serialized header.
    pub raw: [u8; HEADER_SIZE],
}

impl Header {
    /// Serialized header as lowercase hex.
    pub fn hex(&self) -> String {
        hex::encode(self.raw)
    }

    /// nbits as hex, in wire byte order.
    pub fn nbits_hex(&self) -> String {
        hex::encode(self.nbits)
    }

    /// Nonce as hex, in wire byte order.
    pub fn nonce_hex(&self) -> String {
        hex::encode(self.nonce)
    }

    /// Does this header claim to start a chain?
    pub fn has_null_parent(&self) -> bool {
        self.prev_block.is_zero()
    }
}

/// Where a stored header sits relative to the chain it belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderLinkage {
    /// Trusted base of the chain: genesis at height 0 or a checkpoint.
    Root {
        /// Height the root is anchored at.
        height: u64,
        /// Cumulative work through this header.
        accumulated_work: BigUint,
    },
    /// Parent is stored and itself linked or a root.
    Linked {
        /// Parent height + 1.
        height: u64,
        /// Parent work + work of this header.
        accumulated_work: BigUint,
    },
    /// Parent unknown, or itself floating.
    Floating,
}

impl HeaderLinkage {
    /// Height, or `None` while floating.
    pub fn height(&self) -> Option<u64> {
        match self {
            HeaderLinkage::Root { height, .. } | HeaderLinkage::Linked { height, .. } => {
                Some(*height)
            }
            HeaderLinkage::Floating => None,
        }
    }

    /// Cumulative work; zero while floating.
    pub fn accumulated_work(&self) -> BigUint {
        match self {
            HeaderLinkage::Root {
                accumulated_work, ..
            }
            | HeaderLinkage::Linked {
                accumulated_work, ..
            } => accumulated_work.clone(),
            HeaderLinkage::Floating => BigUint::zero(),
        }
    }

    /// Is this header still waiting for its parent?
    pub fn is_floating(&self) -> bool {
        matches!(self, HeaderLinkage::Floating)
    }

    /// Is this header a trusted root?
    pub fn is_root(&self) -> bool {
        matches!(self, HeaderLinkage::Root { .. })
    }
}

/// A header as held by the chain graph store.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredHeader {
    /// Header content.
    pub header: Header,
    /// Derived chain position.
    pub linkage: HeaderLinkage,
}

impl StoredHeader {
    /// Header hash.
    pub fn hash(&self) -> BlockHash {
        self.header.hash
    }

    /// Height, or `None` while floating.
    pub fn height(&self) -> Option<u64> {
        self.linkage.height()
    }

    /// Cumulative work; zero while floating.
    pub fn accumulated_work(&self) -> BigUint {
        self.linkage.accumulated_work()
    }
}
