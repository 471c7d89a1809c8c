//! Crash Point Derivation
//!
//! Deterministically maps (server seed, client seed, round id) to a crash
//! multiplier. The combined SHA-256 digest is reduced to its first 64 bits,
//! normalized to [0, 1), and pushed through an inverse-CDF mapping with a
//! configurable house edge:
//!
//! ```text
//!   multiplier = (1 - house_edge) / (1 - normalized)
//! ```
//!
//! For any cash-out target `m`, P(crash >= m) = (1 - house_edge) / m, so the
//! expected return of every strategy is exactly `1 - house_edge`. Values at
//! or below 1.00 clamp to exactly 1.00, which is the "instant crash"
//! outcome and occurs with probability equal to the house edge.

use rust_decimal::{Decimal, RoundingStrategy};
use sha2::{Digest, Sha256};

/// Number of decimal places a multiplier carries on the wire.
pub const MULTIPLIER_SCALE: u32 = 2;

/// Parameters of the crash point mapping.
///
/// Changing either value changes every derived multiplier, so both must be
/// fixed for the lifetime of a seed chain and mirrored by verifying clients.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveConfig {
    /// House edge as a fraction (0.01 = 1%). Also the instant-crash
    /// probability.
    pub house_edge: Decimal,
    /// Hard cap on the multiplier.
    pub max_multiplier: Decimal,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            house_edge: Decimal::new(1, 2),      // 1%
            max_multiplier: Decimal::new(1000, 0),
        }
    }
}

/// SHA-256 over a UTF-8 string, hex-encoded lowercase.
pub fn hash_seed(seed: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hex::encode(hasher.finalize())
}

/// Combine server seed, client seed, and round id into one digest.
///
/// The concatenation order is part of the public protocol: clients
/// re-derive the multiplier from exactly this string.
pub fn combine_seeds(server_seed: &str, client_seed: &str, round_id: u64) -> String {
    hash_seed(&format!("{server_seed}{client_seed}{round_id}"))
}

/// Reduce a combined digest to its first 64 bits.
///
/// Returns 0 for malformed input rather than panicking; the verifier must
/// never throw on attacker-controlled strings.
pub fn seed_to_u64(combined_hex: &str) -> u64 {
    combined_hex
        .get(..16)
        .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
        .unwrap_or(0)
}

/// Map a 64-bit seed value to a crash multiplier.
///
/// Monotonic in `seed_int`: 0 maps to 1.00 (instant crash), `u64::MAX` to
/// the configured maximum. Truncated (not rounded) to two decimal places so
/// the house never pays above the exact curve.
pub fn multiplier_from_u64(seed_int: u64, config: &DeriveConfig) -> Decimal {
    let normalized = Decimal::from(seed_int) / two_pow_64();
    let survival = Decimal::ONE - normalized;

    // survival is always > 0 since seed_int < 2^64, but the guard keeps the
    // function total for any config.
    if survival <= Decimal::ZERO {
        return config.max_multiplier;
    }

    let raw = (Decimal::ONE - config.house_edge) / survival;
    if raw <= Decimal::ONE {
        return one_scaled();
    }

    let truncated = raw.round_dp_with_strategy(MULTIPLIER_SCALE, RoundingStrategy::ToZero);
    if truncated >= config.max_multiplier {
        config.max_multiplier
    } else if truncated <= Decimal::ONE {
        one_scaled()
    } else {
        truncated
    }
}

/// Derive the crash multiplier for a round.
pub fn crash_point(
    server_seed: &str,
    client_seed: &str,
    round_id: u64,
    config: &DeriveConfig,
) -> Decimal {
    let combined = combine_seeds(server_seed, client_seed, round_id);
    multiplier_from_u64(seed_to_u64(&combined), config)
}

fn two_pow_64() -> Decimal {
    Decimal::from_i128_with_scale(1i128 << 64, 0)
}

fn one_scaled() -> Decimal {
    Decimal::new(100, MULTIPLIER_SCALE)
}

// =============================================================================
// TESTS
// =============================================================================
