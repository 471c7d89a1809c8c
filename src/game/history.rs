//! Round History
//!
//! Bounded archive of settled rounds. Keeps everything a client needs to
//! verify a past round (seeds, commitment, multiplier) plus aggregate bet
//! totals for display, without holding per-bet records indefinitely.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::ledger::{Bet, BetStatus, Currency};
use super::round::{Round, RoundId};

/// Default number of settled rounds to retain.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// Summary of one settled round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// Round identifier.
    pub round_id: RoundId,
    /// Final multiplier.
    pub crash_multiplier: Decimal,
    /// Revealed server seed.
    pub server_seed: String,
    /// Published commitment.
    pub server_seed_hash: String,
    /// Client seed used in the derivation.
    pub client_seed: String,
    /// When the multiplier clock started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the round crashed.
    pub crashed_at: Option<DateTime<Utc>>,
    /// Number of bets placed.
    pub total_bets: usize,
    /// Number of bets that cashed out.
    pub total_wins: usize,
    /// Total TON wagered.
    pub wagered_ton: Decimal,
    /// Total STARS wagered.
    pub wagered_stars: Decimal,
}

impl RoundRecord {
    /// Build a record from a settled round and its drained bets.
    pub fn from_settled(round: &Round, bets: &[Bet]) -> Self {
        let mut wagered_ton = Decimal::ZERO;
        let mut wagered_stars = Decimal::ZERO;
        for bet in bets {
            match bet.currency {
                Currency::Ton => wagered_ton += bet.amount,
                Currency::Stars => wagered_stars += bet.amount,
            }
        }
        Self {
            round_id: round.id(),
            crash_multiplier: round.crash_multiplier().unwrap_or(Decimal::ONE),
            server_seed: round.server_seed().unwrap_or_default().to_string(),
            server_seed_hash: round.server_seed_hash().to_string(),
            client_seed: round.client_seed().to_string(),
            started_at: round.started_at(),
            crashed_at: round.crashed_at(),
            total_bets: bets.len(),
            total_wins: bets.iter().filter(|b| b.status == BetStatus::Won).count(),
            wagered_ton,
            wagered_stars,
        }
    }
}

/// Ring buffer of the most recent settled rounds, newest first on read.
#[derive(Debug)]
pub struct RoundHistory {
    records: VecDeque<RoundRecord>,
    capacity: usize,
}

impl Default for RoundHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl RoundHistory {
    /// Create a history retaining at most `capacity` rounds.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.max(1)),
            capacity: capacity.max(1),
        }
    }

    /// Archive a settled round, evicting the oldest if at capacity.
    pub fn push(&mut self, record: RoundRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// The most recent `limit` records, newest first.
    pub fn latest(&self, limit: usize) -> Vec<RoundRecord> {
        self.records.iter().rev().take(limit).cloned().collect()
    }

    /// Number of archived rounds.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no rounds have been archived yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(round_id: RoundId) -> RoundRecord {
        RoundRecord {
            round_id,
            crash_multiplier: Decimal::new(150, 2),
            server_seed: "seed".into(),
            server_seed_hash: "hash".into(),
            client_seed: "client".into(),
            started_at: None,
            crashed_at: None,
            total_bets: 0,
            total_wins: 0,
            wagered_ton: Decimal::ZERO,
            wagered_stars: Decimal::ZERO,
        }
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut history = RoundHistory::new(3);
        for id in 1..=5 {
            history.push(record(id));
        }
        assert_eq!(history.len(), 3);
        let ids: Vec<RoundId> = history.latest(10).iter().map(|r| r.round_id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn test_latest_respects_limit() {
        let mut history = RoundHistory::default();
        for id in 1..=10 {
            history.push(record(id));
        }
        let latest = history.latest(2);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].round_id, 10);
    }

    #[test]
    fn test_record_aggregates_wagers() {
        use crate::fair::derive::DeriveConfig;
        use crate::fair::seed::ServerSeed;
        use crate::game::ledger::OwnerId;
        use uuid::Uuid;

        let mut round = Round::new(
            9,
            ServerSeed::from_hex("abc".to_string()),
            "xyz".to_string(),
            &DeriveConfig::default(),
        );
        round.begin_running().unwrap();
        round.crash().unwrap();
        round.settle().unwrap();

        let bet = |currency, cents: i64, status| Bet {
            id: Uuid::new_v4(),
            owner: OwnerId(1),
            round_id: 9,
            amount: Decimal::new(cents, 2),
            currency,
            auto_cashout: None,
            cashout_multiplier: None,
            payout: Some(Decimal::ZERO),
            status,
            settled: true,
        };
        let bets = vec![
            bet(Currency::Ton, 150, BetStatus::Won),
            bet(Currency::Ton, 250, BetStatus::Lost),
            bet(Currency::Stars, 500, BetStatus::Lost),
        ];

        let record = RoundRecord::from_settled(&round, &bets);
        assert_eq!(record.total_bets, 3);
        assert_eq!(record.total_wins, 1);
        assert_eq!(record.wagered_ton, Decimal::new(400, 2));
        assert_eq!(record.wagered_stars, Decimal::new(500, 2));
        assert!(!record.server_seed.is_empty());
    }
}
