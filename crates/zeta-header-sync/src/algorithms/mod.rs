//! # Algorithms Module
//!
//! Header codec, proof-of-work arithmetic and response voting.

pub mod codec;
pub mod pow;
pub mod quorum;

pub use codec::{double_sha256, parse_header, parse_header_hex, split_headers, split_headers_hex};
pub use pow::{
    check_work, decode_target, difficulty, header_work, network_difficulty, target_work,
    MAINNET_MAX_TARGET,
};
pub use quorum::{count_responses, select_most_common};
