//! # Proof-of-Work
//!
//! Compact target ("nbits") decoding, difficulty, the proof-of-work
//! acceptance check and per-header chain work.
//!
//! Targets are 256-bit (`primitive_types::U256`). Chain work is widened to
//! `num_bigint::BigUint` so sums over arbitrarily long chains never overflow.

use num_bigint::BigUint;
use num_traits::Zero;
use primitive_types::U256;

use super::codec::double_sha256;
use crate::domain::{Header, Network, PowError};

/// Mainnet maximum target, nbits `0x1d00ffff` (`0xffff << 208`).
pub const MAINNET_MAX_TARGET: U256 = U256([0, 0, 0, 0x0000_0000_ffff_0000]);

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Decode a compact target given in wire byte order.
///
/// The exponent is the last wire byte; the mantissa is the first three
/// wire bytes read little-endian. A zero result is returned as-is.
///
/// The sign bit only counts when mantissa bits survive the shift, so
/// `0x01803456` decodes to zero rather than a negative target.
pub fn decode_target(nbits: [u8; 4]) -> Result<U256, PowError> {
    let compact = u32::from_le_bytes(nbits);
    let exponent = compact >> 24;
    let mantissa = compact & MANTISSA_MASK;
    let negative = compact & SIGN_BIT != 0;

    if exponent <= 3 {
        let word = mantissa >> (8 * (3 - exponent));
        if negative && word != 0 {
            return Err(PowError::NegativeTarget);
        }
        return Ok(U256::from(word));
    }

    if negative && mantissa != 0 {
        return Err(PowError::NegativeTarget);
    }

    let shift = 8 * (exponent as usize - 3);
    let m = U256::from(mantissa);
    if !m.is_zero() && m.bits() + shift > 256 {
        return Err(PowError::TargetOverflow);
    }
    Ok(m << shift)
}

/// Decode a target that a hash could actually satisfy.
fn usable_target(nbits: [u8; 4]) -> Result<U256, PowError> {
    let target = decode_target(nbits)?;
    if target.is_zero() {
        return Err(PowError::ZeroTarget);
    }
    Ok(target)
}

/// Difficulty relative to `max_target`. Display only.
///
/// Returns 0.0 when the target cannot be decoded or is zero.
pub fn difficulty(nbits: [u8; 4], max_target: &U256) -> f64 {
    match usable_target(nbits) {
        Ok(target) => u256_to_f64(max_target) / u256_to_f64(&target),
        Err(_) => 0.0,
    }
}

/// Difficulty relative to `network`'s proof-of-work limit.
pub fn network_difficulty(nbits: [u8; 4], network: Network) -> f64 {
    match usable_target(network.pow_limit_nbits()) {
        Ok(limit) => difficulty(nbits, &limit),
        Err(_) => 0.0,
    }
}

/// Does the header's hash satisfy the target claimed by its own nbits?
///
/// The hash is recomputed from `raw`, never taken from the struct.
pub fn check_work(header: &Header) -> bool {
    let Ok(target) = usable_target(header.nbits) else {
        return false;
    };
    let hash = double_sha256(&header.raw);
    U256::from_little_endian(&hash) <= target
}

/// Work contributed by one header: `2^256 / (target + 1)`.
///
/// Zero for an undecodable target.
pub fn header_work(header: &Header) -> BigUint {
    target_work(header.nbits)
}

/// Work for a compact target, see [`header_work`].
pub fn target_work(nbits: [u8; 4]) -> BigUint {
    let Ok(target) = usable_target(nbits) else {
        return BigUint::zero();
    };
    if target == U256::MAX {
        return BigUint::from(1u8);
    }
    // 2^256 / (t + 1) == (2^256 - t - 1) / (t + 1) + 1 == !t / (t + 1) + 1
    let work = (!target) / (target + U256::one()) + U256::one();
    u256_to_biguint(&work)
}

/// Widen a 256-bit integer.
pub fn u256_to_biguint(value: &U256) -> BigUint {
    let mut bytes = [0u8; 32];
    value.to_little_endian(&mut bytes);
    BigUint::from_bytes_le(&bytes)
}

/// Lossy conversion for display arithmetic.
pub fn u256_to_f64(value: &U256) -> f64 {
    value
        .0
        .iter()
        .rev()
        .fold(0.0, |acc, word| acc * 18_446_744_073_709_551_616.0 + *word as f64)
}
