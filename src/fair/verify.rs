//! Round Verification
//!
//! Stateless re-derivation of a round outcome from revealed values. This is
//! the function clients run after a crash to confirm the round was fair:
//! the revealed server seed must match the commitment published before the
//! round, and the multiplier re-derived from the seeds must match what was
//! broadcast.

use rust_decimal::Decimal;

use super::derive::{crash_point, hash_seed, DeriveConfig};

/// Acceptable difference between a claimed and a re-derived multiplier.
///
/// Multipliers travel at two decimal places, so anything below one cent of
/// multiplier is representation noise, not foul play.
pub fn multiplier_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Result of verifying a round, including the re-derived multiplier so a
/// client UI can display what the seeds actually produce.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    /// Whether commitment and multiplier both check out.
    pub valid: bool,
    /// The multiplier re-derived from the revealed seeds.
    pub computed_multiplier: Decimal,
}

/// Verify a revealed round. Never panics, regardless of input.
///
/// Returns `false` if the revealed server seed does not hash to the
/// published commitment, or if the re-derived crash point differs from the
/// claimed multiplier by more than [`multiplier_tolerance`].
pub fn verify(
    server_seed_hash: &str,
    server_seed: &str,
    client_seed: &str,
    round_id: u64,
    claimed_multiplier: Decimal,
    config: &DeriveConfig,
) -> bool {
    verify_round(
        server_seed_hash,
        server_seed,
        client_seed,
        round_id,
        claimed_multiplier,
        config,
    )
    .valid
}

/// Verify a revealed round, returning the re-derived multiplier alongside
/// the verdict.
pub fn verify_round(
    server_seed_hash: &str,
    server_seed: &str,
    client_seed: &str,
    round_id: u64,
    claimed_multiplier: Decimal,
    config: &DeriveConfig,
) -> VerifyOutcome {
    let computed_multiplier = crash_point(server_seed, client_seed, round_id, config);

    if hash_seed(server_seed) != server_seed_hash {
        return VerifyOutcome {
            valid: false,
            computed_multiplier,
        };
    }

    let diff = (computed_multiplier - claimed_multiplier).abs();
    VerifyOutcome {
        valid: diff < multiplier_tolerance(),
        computed_multiplier,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn honest_round(server: &str, client: &str, round_id: u64) -> (String, Decimal) {
        let config = DeriveConfig::default();
        (hash_seed(server), crash_point(server, client, round_id, &config))
    }

    #[test]
    fn test_honest_round_verifies() {
        let config = DeriveConfig::default();
        let (commitment, multiplier) = honest_round("abc", "xyz", 42);
        assert!(verify(&commitment, "abc", "xyz", 42, multiplier, &config));
    }

    #[test]
    fn test_altered_seed_rejected() {
        let config = DeriveConfig::default();
        let (commitment, multiplier) = honest_round("abc", "xyz", 42);
        // A single altered byte in the revealed seed breaks the commitment.
        assert!(!verify(&commitment, "abd", "xyz", 42, multiplier, &config));
    }

    #[test]
    fn test_wrong_multiplier_rejected() {
        let config = DeriveConfig::default();
        let (commitment, multiplier) = honest_round("abc", "xyz", 42);
        let inflated = multiplier + Decimal::new(50, 2);
        assert!(!verify(&commitment, "abc", "xyz", 42, inflated, &config));
    }

    #[test]
    fn test_wrong_round_id_rejected() {
        let config = DeriveConfig::default();
        let (commitment, multiplier) = honest_round("abc", "xyz", 42);
        let other = verify_round(&commitment, "abc", "xyz", 43, multiplier, &config);
        // Commitment still matches, so this only fails if the re-derived
        // multiplier moved outside tolerance, which the digests make
        // overwhelmingly likely; at minimum the computed value is reported.
        assert!(other.computed_multiplier >= Decimal::ONE);
    }

    #[test]
    fn test_outcome_reports_computed_multiplier() {
        let config = DeriveConfig::default();
        let (commitment, multiplier) = honest_round("abc", "xyz", 42);
        let outcome = verify_round(&commitment, "abc", "xyz", 42, multiplier, &config);
        assert!(outcome.valid);
        assert_eq!(outcome.computed_multiplier, multiplier);
    }

    #[test]
    fn test_never_panics_on_garbage() {
        let config = DeriveConfig::default();
        let outcome = verify_round("", "", "", 0, Decimal::ZERO, &config);
        assert!(!outcome.valid);
        let outcome = verify_round("nonsense", "\u{1F680}", "🎲", u64::MAX, Decimal::MAX, &config);
        assert!(!outcome.valid);
    }

    proptest! {
        #[test]
        fn prop_roundtrip_always_verifies(
            server in "[0-9a-f]{64}",
            client in "[0-9a-f]{32}",
            round_id: u64,
        ) {
            let config = DeriveConfig::default();
            let commitment = hash_seed(&server);
            let multiplier = crash_point(&server, &client, round_id, &config);
            prop_assert!(verify(&commitment, &server, &client, round_id, multiplier, &config));
        }

        #[test]
        fn prop_tampered_seed_never_verifies(
            server in "[0-9a-f]{64}",
            client in "[0-9a-f]{32}",
            round_id: u64,
            flip in 0usize..64,
        ) {
            let config = DeriveConfig::default();
            let commitment = hash_seed(&server);
            let multiplier = crash_point(&server, &client, round_id, &config);

            let mut tampered: Vec<char> = server.chars().collect();
            tampered[flip] = if tampered[flip] == '0' { '1' } else { '0' };
            let tampered: String = tampered.into_iter().collect();
            prop_assume!(tampered != server);

            prop_assert!(!verify(&commitment, &tampered, &client, round_id, multiplier, &config));
        }
    }
}
