//! Seed Generation
//!
//! Server seeds are 32 bytes of OS randomness, hex-encoded. The SHA-256
//! commitment over the hex string is published before a round opens for
//! betting; the seed itself stays secret until the crash.

use rand::rngs::OsRng;
use rand::RngCore;

use super::derive::hash_seed;

/// Length of a server seed in raw bytes (64 hex characters).
pub const SERVER_SEED_BYTES: usize = 32;

/// Length of a generated client seed in raw bytes (32 hex characters).
pub const CLIENT_SEED_BYTES: usize = 16;

/// A server seed together with its published commitment hash.
///
/// The raw seed is deliberately kept out of `Debug` output so it cannot
/// leak into logs before the round crashes.
#[derive(Clone)]
pub struct ServerSeed {
    seed: String,
    hash: String,
}

impl ServerSeed {
    /// Generate a fresh seed from OS randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SERVER_SEED_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self::from_hex(hex::encode(bytes))
    }

    /// Build a seed from an existing hex string, computing its commitment.
    pub fn from_hex(seed: String) -> Self {
        let hash = hash_seed(&seed);
        Self { seed, hash }
    }

    /// The secret seed value. Callers are responsible for reveal timing;
    /// within the engine only [`crate::game::round::Round`] touches this.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// The SHA-256 commitment, safe to publish at any time.
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl std::fmt::Debug for ServerSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSeed")
            .field("seed", &"<redacted>")
            .field("hash", &self.hash)
            .finish()
    }
}

/// Generate a client seed for rounds where no player supplied one.
pub fn generate_client_seed() -> String {
    let mut bytes = [0u8; CLIENT_SEED_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fair::derive::hash_seed;

    #[test]
    fn test_generate_length_and_charset() {
        let seed = ServerSeed::generate();
        assert_eq!(seed.seed().len(), SERVER_SEED_BYTES * 2);
        assert!(seed.seed().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(seed.hash().len(), 64);
    }

    #[test]
    fn test_commitment_matches_seed() {
        let seed = ServerSeed::from_hex("abc".to_string());
        assert_eq!(seed.hash(), hash_seed("abc"));
    }

    #[test]
    fn test_generate_is_collision_resistant() {
        // Two fresh seeds colliding would mean OS randomness is broken.
        let a = ServerSeed::generate();
        let b = ServerSeed::generate();
        assert_ne!(a.seed(), b.seed());
    }

    #[test]
    fn test_debug_redacts_seed() {
        let seed = ServerSeed::generate();
        let debug = format!("{:?}", seed);
        assert!(!debug.contains(seed.seed()));
        assert!(debug.contains(seed.hash()));
    }

    #[test]
    fn test_client_seed_generation() {
        let a = generate_client_seed();
        let b = generate_client_seed();
        assert_eq!(a.len(), CLIENT_SEED_BYTES * 2);
        assert_ne!(a, b);
    }
}
