//! Round Lifecycle
//!
//! A round moves through `pending -> running -> crashed -> settled`. The
//! type enforces the two fairness invariants at the API level: the server
//! seed commitment is available from creation (published before any bet),
//! while the seed itself and the derived crash point are unreadable until
//! the round has crashed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::fair::derive::{crash_point, DeriveConfig};
use crate::fair::seed::ServerSeed;

/// Monotonically increasing round identifier.
pub type RoundId = u64;

/// Phase of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Betting window is open; multiplier clock has not started.
    Pending,
    /// Multiplier is climbing; cash-outs allowed.
    Running,
    /// Crash point reached; seeds revealed; bets being resolved.
    Crashed,
    /// All bets resolved and archived.
    Settled,
}

/// Attempted an operation in the wrong phase.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("operation requires {expected:?} phase, round {round_id} is {actual:?}")]
pub struct PhaseError {
    /// Round the operation targeted.
    pub round_id: RoundId,
    /// Phase the operation requires.
    pub expected: RoundPhase,
    /// Phase the round is actually in.
    pub actual: RoundPhase,
}

/// One play cycle from bet window open to crash and settlement.
#[derive(Debug, Clone)]
pub struct Round {
    id: RoundId,
    phase: RoundPhase,
    seed: ServerSeed,
    client_seed: String,
    crash_point: Decimal,
    started_at: Option<DateTime<Utc>>,
    crashed_at: Option<DateTime<Utc>>,
    run_started: Option<Instant>,
}

impl Round {
    /// Create a round in the `pending` phase. The crash point is derived
    /// immediately but stays hidden until the crash.
    pub fn new(id: RoundId, seed: ServerSeed, client_seed: String, config: &DeriveConfig) -> Self {
        let crash_point = crash_point(seed.seed(), &client_seed, id, config);
        Self {
            id,
            phase: RoundPhase::Pending,
            seed,
            client_seed,
            crash_point,
            started_at: None,
            crashed_at: None,
            run_started: None,
        }
    }

    /// Round identifier.
    pub fn id(&self) -> RoundId {
        self.id
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// The published commitment. Available in every phase.
    pub fn server_seed_hash(&self) -> &str {
        self.seed.hash()
    }

    /// The client seed for this round. Public from creation.
    pub fn client_seed(&self) -> &str {
        &self.client_seed
    }

    /// The server seed, revealed only once the round has crashed.
    pub fn server_seed(&self) -> Option<&str> {
        match self.phase {
            RoundPhase::Crashed | RoundPhase::Settled => Some(self.seed.seed()),
            _ => None,
        }
    }

    /// The crash multiplier, visible only once the round has crashed.
    pub fn crash_multiplier(&self) -> Option<Decimal> {
        match self.phase {
            RoundPhase::Crashed | RoundPhase::Settled => Some(self.crash_point),
            _ => None,
        }
    }

    /// The derived crash point. Engine-internal: leaking this before the
    /// crash would let the house (or a log reader) front-run players.
    pub(crate) fn crash_point_internal(&self) -> Decimal {
        self.crash_point
    }

    /// Wall-clock time the multiplier clock started.
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Wall-clock time of the crash.
    pub fn crashed_at(&self) -> Option<DateTime<Utc>> {
        self.crashed_at
    }

    /// Milliseconds since the multiplier clock started. Zero while pending.
    pub fn elapsed_ms(&self) -> u64 {
        self.run_started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// `pending -> running`: the betting window expired.
    pub fn begin_running(&mut self) -> Result<(), PhaseError> {
        self.expect_phase(RoundPhase::Pending)?;
        self.phase = RoundPhase::Running;
        self.started_at = Some(Utc::now());
        self.run_started = Some(Instant::now());
        Ok(())
    }

    /// `running -> crashed`: the derived multiplier was reached. Seeds
    /// become readable atomically with this transition.
    pub fn crash(&mut self) -> Result<(), PhaseError> {
        self.expect_phase(RoundPhase::Running)?;
        self.phase = RoundPhase::Crashed;
        self.crashed_at = Some(Utc::now());
        Ok(())
    }

    /// `crashed -> settled`: every bet has been resolved.
    pub fn settle(&mut self) -> Result<(), PhaseError> {
        self.expect_phase(RoundPhase::Crashed)?;
        self.phase = RoundPhase::Settled;
        Ok(())
    }

    fn expect_phase(&self, expected: RoundPhase) -> Result<(), PhaseError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(PhaseError {
                round_id: self.id,
                expected,
                actual: self.phase,
            })
        }
    }

    /// Override the derived crash point so tests can script outcomes.
    #[cfg(test)]
    pub(crate) fn set_crash_point_for_test(&mut self, crash_point: Decimal) {
        self.crash_point = crash_point;
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fair::derive::hash_seed;
    use crate::fair::verify::verify;

    fn test_round(id: RoundId) -> Round {
        Round::new(
            id,
            ServerSeed::from_hex("abc".to_string()),
            "xyz".to_string(),
            &DeriveConfig::default(),
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut round = test_round(42);
        assert_eq!(round.phase(), RoundPhase::Pending);

        round.begin_running().unwrap();
        assert_eq!(round.phase(), RoundPhase::Running);
        assert!(round.started_at().is_some());

        round.crash().unwrap();
        assert_eq!(round.phase(), RoundPhase::Crashed);
        assert!(round.crashed_at().is_some());

        round.settle().unwrap();
        assert_eq!(round.phase(), RoundPhase::Settled);
    }

    #[test]
    fn test_invalid_transitions_rejected() {
        let mut round = test_round(1);
        assert!(round.crash().is_err());
        assert!(round.settle().is_err());

        round.begin_running().unwrap();
        let err = round.begin_running().unwrap_err();
        assert_eq!(err.expected, RoundPhase::Pending);
        assert_eq!(err.actual, RoundPhase::Running);
    }

    #[test]
    fn test_seed_hidden_until_crash() {
        let mut round = test_round(42);
        assert!(round.server_seed().is_none());
        assert!(round.crash_multiplier().is_none());
        // The commitment is public the whole time.
        assert_eq!(round.server_seed_hash(), hash_seed("abc"));

        round.begin_running().unwrap();
        assert!(round.server_seed().is_none());

        round.crash().unwrap();
        assert_eq!(round.server_seed(), Some("abc"));
        assert!(round.crash_multiplier().is_some());
    }

    #[test]
    fn test_revealed_round_verifies() {
        let mut round = test_round(42);
        round.begin_running().unwrap();
        round.crash().unwrap();

        assert!(verify(
            round.server_seed_hash(),
            round.server_seed().unwrap(),
            round.client_seed(),
            round.id(),
            round.crash_multiplier().unwrap(),
            &DeriveConfig::default(),
        ));
    }

    #[test]
    fn test_elapsed_zero_while_pending() {
        let round = test_round(7);
        assert_eq!(round.elapsed_ms(), 0);
    }
}
