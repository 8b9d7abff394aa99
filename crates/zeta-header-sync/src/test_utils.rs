//! Header fixtures and mining helpers for tests.
//!
//! Real mainnet headers cover parsing and proof-of-work against actual
//! chain data; synthetic chains are mined on the spot against easy targets.

use crate::algorithms::{check_work, double_sha256, parse_header, parse_header_hex};
use crate::domain::{BlockHash, Header, REGTEST_GENESIS_HEX, REGTEST_POW_LIMIT_NBITS};

/// Mainnet block 500.
pub const MAINNET_500_HEX: &str = "01000000459f16a1c695d04282fd9f84f4fe771121d467e5497eb1aa8bf66d8000000000cf7ef5b5c22d4edf641f0fd5fcfbcefa30acaa2fbc910206f8773e3918748504c1586e49ffff001d398eff7a";

/// Mainnet block 501.
pub const MAINNET_501_HEX: &str = "01000000db773c8f3b90efa51d8e40291406897062c164dff617d2a7bf64f64f00000000774328ddff50701ade3a2e1f28711643a17ad5f53f1e94639b04234fa0a5bbcf575b6e49ffff001d7232e103";

/// Mainnet block 502.
pub const MAINNET_502_HEX: &str = "01000000f9980503946685d96c93e577fbc9178bf36afda513d16ca79272884600000000a2211eb4bc799c5a8f144bf04cae15842c7981ceab73ab53df166eaec53b6d99275d6e49ffff001d1f75f325";

/// Work of one mainnet difficulty-1 header.
pub const DIFFICULTY_ONE_WORK: u64 = 4_295_032_833;

/// Easiest target (regtest limit): work 2 per header.
pub const EASY_NBITS: [u8; 4] = REGTEST_POW_LIMIT_NBITS;

/// nbits `0x2000ffff`: work 256 per header, about 256 hashes to mine.
pub const HARDER_NBITS: [u8; 4] = [0xff, 0xff, 0x00, 0x20];

/// Parse a fixture that is known to be valid.
pub fn fixture(hex: &str) -> Header {
    parse_header_hex(hex).expect("fixture header must parse")
}

/// The regtest genesis header (null parent, easy target).
pub fn regtest_genesis() -> Header {
    fixture(REGTEST_GENESIS_HEX)
}

/// Mine a header on top of `prev` that satisfies `nbits`.
///
/// `timestamp` also seeds the merkle root, so siblings mined with
/// different timestamps get different hashes.
pub fn mine_header(prev: &BlockHash, nbits: [u8; 4], timestamp: u32) -> Header {
    let mut raw = [0u8; 80];
    raw[0..4].copy_from_slice(&1i32.to_le_bytes());
    raw[4..36].copy_from_slice(prev.as_wire_bytes());
    raw[36..68].copy_from_slice(&double_sha256(&timestamp.to_le_bytes()));
    raw[68..72].copy_from_slice(&timestamp.to_le_bytes());
    raw[72..76].copy_from_slice(&nbits);

    for nonce in 0u32.. {
        raw[76..80].copy_from_slice(&nonce.to_le_bytes());
        let header = parse_header(&raw).expect("80 bytes always parse");
        if check_work(&header) {
            return header;
        }
    }
    unreachable!("nonce space exhausted")
}

/// Mine `len` consecutive headers starting on top of `parent`.
pub fn mine_chain(parent: &BlockHash, len: usize, nbits: [u8; 4], start_ts: u32) -> Vec<Header> {
    let mut chain = Vec::with_capacity(len);
    let mut prev = *parent;
    for i in 0..len {
        let header = mine_header(&prev, nbits, start_ts + i as u32);
        prev = header.hash;
        chain.push(header);
    }
    chain
}

/// Mine a header with a fixed nonce that fails its own target.
pub fn invalid_work_header(prev: &BlockHash) -> Header {
    let mut raw = [0u8; 80];
    raw[0..4].copy_from_slice(&1i32.to_le_bytes());
    raw[4..36].copy_from_slice(prev.as_wire_bytes());
    // 0x03000001: target 1, no hash will meet it
    raw[72..76].copy_from_slice(&[0x01, 0x00, 0x00, 0x03]);
    parse_header(&raw).expect("80 bytes always parse")
}

/// Concatenated hex of `headers`, as a bulk response carries them.
pub fn concat_hex(headers: &[Header]) -> String {
    headers.iter().map(Header::hex).collect()
}

/// Hex of each header.
pub fn hex_list(headers: &[Header]) -> Vec<String> {
    headers.iter().map(Header::hex).collect()
}
