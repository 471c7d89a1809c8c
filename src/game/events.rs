//! Round Events
//!
//! Events broadcast to subscribers as a round plays out. Emission order is
//! fixed per round: one `round_start`, zero or more `tick`s with strictly
//! increasing sequence numbers, exactly one `crash`, then one `settlement`.
//! The engine publishes these over a `tokio::sync::broadcast` channel, so a
//! subscriber that falls behind loses the oldest events first and never
//! blocks the round loop.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ledger::{Bet, BetStatus, Currency, OwnerId};
use super::round::RoundId;

/// Final outcome of one bet, carried by the settlement event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetOutcome {
    /// Bet identifier.
    pub bet_id: Uuid,
    /// Bet owner.
    pub owner: OwnerId,
    /// Stake.
    pub amount: Decimal,
    /// Stake currency.
    pub currency: Currency,
    /// Won or lost.
    pub status: BetStatus,
    /// Multiplier the bet resolved at.
    pub multiplier: Option<Decimal>,
    /// Amount credited back. Zero when lost.
    pub payout: Decimal,
}

impl From<&Bet> for BetOutcome {
    fn from(bet: &Bet) -> Self {
        Self {
            bet_id: bet.id,
            owner: bet.owner,
            amount: bet.amount,
            currency: bet.currency,
            status: bet.status,
            multiplier: bet.cashout_multiplier,
            payout: bet.payout.unwrap_or(Decimal::ZERO),
        }
    }
}

/// One event in the per-round broadcast stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RoundEvent {
    /// A new round opened for betting. Carries the commitment, never the
    /// seed.
    RoundStart {
        /// Round identifier.
        round_id: RoundId,
        /// SHA-256 commitment to the server seed.
        server_seed_hash: String,
        /// Client seed mixed into the derivation.
        client_seed: String,
        /// Seconds until betting closes and the multiplier starts.
        betting_window_secs: u64,
    },

    /// Periodic multiplier update while the round runs.
    Tick {
        /// Round identifier.
        round_id: RoundId,
        /// Strictly increasing within the round, starting at 0.
        seq: u64,
        /// Milliseconds since the multiplier clock started.
        elapsed_ms: u64,
        /// Current multiplier, capped at the crash point.
        multiplier: Decimal,
    },

    /// The round crashed. Reveals the seeds so clients can verify.
    Crash {
        /// Round identifier.
        round_id: RoundId,
        /// Final multiplier.
        multiplier: Decimal,
        /// The revealed server seed.
        server_seed: String,
        /// The client seed used in the derivation.
        client_seed: String,
    },

    /// All bets for the round have been resolved.
    Settlement {
        /// Round identifier.
        round_id: RoundId,
        /// Outcome of every bet placed this round.
        bets: Vec<BetOutcome>,
    },
}

impl RoundEvent {
    /// The round this event belongs to.
    pub fn round_id(&self) -> RoundId {
        match self {
            RoundEvent::RoundStart { round_id, .. }
            | RoundEvent::Tick { round_id, .. }
            | RoundEvent::Crash { round_id, .. }
            | RoundEvent::Settlement { round_id, .. } => *round_id,
        }
    }

    /// Serialize to a JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_tagging() {
        let event = RoundEvent::Tick {
            round_id: 7,
            seq: 3,
            elapsed_ms: 300,
            multiplier: Decimal::new(103, 2),
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"event\":\"tick\""));
        assert!(json.contains("\"seq\":3"));

        let back: RoundEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_round_start_carries_commitment_only() {
        let event = RoundEvent::RoundStart {
            round_id: 1,
            server_seed_hash: "aa".repeat(32),
            client_seed: "cafebabe".into(),
            betting_window_secs: 5,
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("server_seed_hash"));
        assert!(!json.contains("\"server_seed\":"));
    }

    #[test]
    fn test_crash_reveals_seed() {
        let event = RoundEvent::Crash {
            round_id: 1,
            multiplier: Decimal::new(217, 2),
            server_seed: "deadbeef".into(),
            client_seed: "cafebabe".into(),
        };
        let json = event.to_json().unwrap();
        assert!(json.contains("\"server_seed\":\"deadbeef\""));
        assert_eq!(event.round_id(), 1);
    }
}
