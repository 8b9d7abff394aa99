//! # Binary Header Codec
//!
//! Parses the fixed 80-byte header layout:
//!
//! ```text
//! version(4 LE) | prev_block(32) | merkle_root(32) | timestamp(4 LE) | nbits(4) | nonce(4)
//! ```
//!
//! The raw bytes are kept verbatim as the canonical encoding; nothing is
//! ever re-serialized from the parsed fields.

use sha2::{Digest, Sha256};

use super::pow::{difficulty, MAINNET_MAX_TARGET};
use crate::domain::{BlockHash, Header, HeaderInput, HeaderSyncError, HEADER_SIZE};

/// SHA256(SHA256(data)).
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

fn array<const N: usize>(raw: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&raw[offset..offset + N]);
    out
}

/// Parse exactly 80 raw bytes.
pub fn parse_header(raw: &[u8]) -> Result<Header, HeaderSyncError> {
    let raw: [u8; HEADER_SIZE] = raw.try_into().map_err(|_| {
        HeaderSyncError::MalformedHeader(format!(
            "expected {} bytes, got {}",
            HEADER_SIZE,
            raw.len()
        ))
    })?;

    let nbits = array::<4>(&raw, 72);

    Ok(Header {
        hash: BlockHash::from_wire_bytes(double_sha256(&raw)),
        version: i32::from_le_bytes(array(&raw, 0)),
        prev_block: BlockHash::from_wire_bytes(array(&raw, 4)),
        merkle_root: BlockHash::from_wire_bytes(array(&raw, 36)),
        timestamp: u32::from_le_bytes(array(&raw, 68)),
        nbits,
        nonce: array(&raw, 76),
        difficulty: difficulty(nbits, &MAINNET_MAX_TARGET),
        raw,
    })
}

/// Hex-decode, then [`parse_header`].
pub fn parse_header_hex(hex: &str) -> Result<Header, HeaderSyncError> {
    let raw = hex::decode(hex)
        .map_err(|e| HeaderSyncError::MalformedHeader(format!("invalid hex: {}", e)))?;
    parse_header(&raw)
}

/// Split a concatenation of headers, in arrival order.
///
/// A trailing partial header fails the whole blob.
pub fn split_headers(blob: &[u8]) -> Result<Vec<Header>, HeaderSyncError> {
    if blob.len() % HEADER_SIZE != 0 {
        return Err(HeaderSyncError::MalformedHeader(format!(
            "{} bytes is not a whole number of headers",
            blob.len()
        )));
    }
    blob.chunks_exact(HEADER_SIZE).map(parse_header).collect()
}

/// Hex form of [`split_headers`].
pub fn split_headers_hex(hex: &str) -> Result<Vec<Header>, HeaderSyncError> {
    let blob = hex::decode(hex)
        .map_err(|e| HeaderSyncError::MalformedHeader(format!("invalid hex: {}", e)))?;
    split_headers(&blob)
}

impl HeaderInput {
    /// Parse into a header.
    ///
    /// Already-parsed headers are re-derived from their raw bytes so a
    /// hand-edited struct can never smuggle in a mismatched hash.
    pub fn into_header(self) -> Result<Header, HeaderSyncError> {
        match self {
            HeaderInput::Parsed(header) => parse_header(&header.raw),
            HeaderInput::Raw(raw) => parse_header(&raw),
            HeaderInput::Hex(hex) => parse_header_hex(&hex),
        }
    }
}
