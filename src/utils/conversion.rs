//! Amount decoding and fixed-point conversion.
//!
//! Vault events carry a `u256` as two 128-bit limbs. The limbs are rebuilt
//! into an alloy `U256`, then scaled with `BigUint` so the intermediate
//! product never truncates.

use alloy::primitives::U256;
use num_bigint::BigUint;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;

use crate::error::{AggregateError, Result};

// ============================================
// Limb Parsing
// ============================================

/// Parse one limb of a `u256` as rendered by the indexing framework.
///
/// Accepts plain decimal digits or a `0x`-prefixed hex string. Signs,
/// whitespace inside the number, and values wider than 128 bits are rejected.
pub fn parse_limb(limb: &'static str, value: &str) -> Result<u128> {
    let trimmed = value.trim();

    let (digits, radix) = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        Some(hex) => (hex, 16),
        None => (trimmed, 10),
    };

    if digits.is_empty() {
        return Err(AggregateError::malformed(limb, value, "empty value"));
    }
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(AggregateError::malformed(
            limb,
            value,
            "not a non-negative integer",
        ));
    }

    u128::from_str_radix(digits, radix).map_err(|e| AggregateError::malformed(limb, value, e))
}

// ============================================
// U256 Reconstruction
// ============================================

/// Rebuild `high * 2^128 + low`.
pub fn uint256_from_limbs(high: u128, low: u128) -> U256 {
    (U256::from(high) << 128usize) | U256::from(low)
}

/// Convert alloy U256 into a `BigUint` via its little-endian bytes.
pub fn u256_to_biguint(value: U256) -> BigUint {
    let bytes: [u8; 32] = value.to_le_bytes();
    BigUint::from_bytes_le(&bytes)
}

// ============================================
// Fixed-Point Scaling
// ============================================

/// Scale a raw token amount down to a display value.
///
/// Computes `floor(raw * 10^precision / 10^decimals) / 10^precision`. The
/// product and quotient are exact; precision is only lost in the final
/// conversion to `f64`, which rounds to nearest.
///
/// # Example
/// ```ignore
/// let raw = U256::from(1_500_000_000_000_000_000u128); // 1.5e18
/// assert_eq!(scale_to_display(raw, 18, 5), 1.5);
/// ```
pub fn scale_to_display(raw: U256, decimals: u8, precision: u8) -> f64 {
    let scaled = u256_to_biguint(raw) * big_pow10(precision) / big_pow10(decimals);
    let units = scaled.to_f64().unwrap_or(0.0);

    units / 10f64.powi(precision as i32)
}

// ============================================
// Internal Helpers
// ============================================

static POW10_CACHE: Lazy<[BigUint; 25]> =
    Lazy::new(|| std::array::from_fn(|i| BigUint::from(10u32).pow(i as u32)));

/// Compute 10^exp as BigUint.
pub(crate) fn big_pow10(exp: u8) -> BigUint {
    if (exp as usize) < POW10_CACHE.len() {
        POW10_CACHE[exp as usize].clone()
    } else {
        BigUint::from(10u32).pow(exp as u32)
    }
}
