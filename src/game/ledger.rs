//! Bet Ledger
//!
//! Records bets, owner balances, and payouts for one table. All mutation
//! happens under the table lock, so debit-and-create-bet and
//! credit-and-mark-won are atomic with respect to each other; concurrent
//! requests from the same owner cannot double-spend.
//!
//! Bets are stored in placement order, which fixes the settlement order for
//! auto-cashouts at equal thresholds: earliest bet wins.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::round::{PhaseError, Round, RoundId, RoundPhase};

/// Identifies the owner of a balance and its bets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

/// Supported currencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// TON coin.
    Ton,
    /// Telegram Stars.
    Stars,
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Currency::Ton => write!(f, "TON"),
            Currency::Stars => write!(f, "STARS"),
        }
    }
}

/// Status of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    /// Open: stake debited, outcome undecided.
    Pending,
    /// Cashed out before the crash.
    Won,
    /// Still open when the round crashed.
    Lost,
}

/// A single bet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    /// Unique bet identifier.
    pub id: Uuid,
    /// Who placed it.
    pub owner: OwnerId,
    /// Round it belongs to.
    pub round_id: RoundId,
    /// Stake, debited at placement.
    pub amount: Decimal,
    /// Currency of the stake and payout.
    pub currency: Currency,
    /// Multiplier at which the bet cashes out automatically.
    pub auto_cashout: Option<Decimal>,
    /// Multiplier actually realized. Set once, at cash-out or crash.
    pub cashout_multiplier: Option<Decimal>,
    /// Amount credited back. Zero for lost bets.
    pub payout: Option<Decimal>,
    /// Current status.
    pub status: BetStatus,
    /// Whether settlement has finalized this bet.
    pub settled: bool,
}

/// Receipt returned to the caller when a bet cashes out.
#[derive(Debug, Clone, Serialize)]
pub struct CashoutReceipt {
    /// The cashed-out bet.
    pub bet_id: Uuid,
    /// Bet owner.
    pub owner: OwnerId,
    /// Round the bet belonged to.
    pub round_id: RoundId,
    /// Multiplier the payout was computed at.
    pub multiplier: Decimal,
    /// Amount credited.
    pub payout: Decimal,
    /// Currency credited.
    pub currency: Currency,
}

/// Stake limits per currency, from table configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BetLimits {
    /// Minimum TON stake.
    pub min_ton: Decimal,
    /// Maximum TON stake.
    pub max_ton: Decimal,
    /// Minimum STARS stake.
    pub min_stars: Decimal,
    /// Maximum STARS stake.
    pub max_stars: Decimal,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            min_ton: Decimal::new(1, 2),        // 0.01
            max_ton: Decimal::new(100, 0),      // 100
            min_stars: Decimal::ONE,            // 1
            max_stars: Decimal::new(10_000, 0), // 10 000
        }
    }
}

impl BetLimits {
    fn range(&self, currency: Currency) -> (Decimal, Decimal) {
        match currency {
            Currency::Ton => (self.min_ton, self.max_ton),
            Currency::Stars => (self.min_stars, self.max_stars),
        }
    }
}

/// Why a bet operation was rejected. No state changes on any error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BetError {
    /// Input failed validation.
    #[error("invalid bet: {0}")]
    Validation(String),

    /// Operation not valid in the round's current phase.
    #[error(transparent)]
    InvalidPhase(#[from] PhaseError),

    /// Owner cannot cover the stake.
    #[error("insufficient {currency} balance")]
    InsufficientFunds {
        /// Currency that lacked funds.
        currency: Currency,
    },

    /// Owner already has an open bet this round.
    #[error("an open bet already exists for this round")]
    DuplicateBet,

    /// No open bet to cash out.
    #[error("no active bet to cash out")]
    NoActiveBet,
}

/// Machine-readable error kind, for protocol mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetErrorKind {
    /// Bad input; safe to correct and retry.
    Validation,
    /// Wrong phase; client should resync round status.
    Phase,
    /// Insufficient balance.
    Funds,
}

impl BetError {
    /// Classify per the error taxonomy.
    pub fn kind(&self) -> BetErrorKind {
        match self {
            BetError::Validation(_) | BetError::DuplicateBet | BetError::NoActiveBet => {
                BetErrorKind::Validation
            }
            BetError::InvalidPhase(_) => BetErrorKind::Phase,
            BetError::InsufficientFunds { .. } => BetErrorKind::Funds,
        }
    }
}

/// Internal settlement failure. Retried by the engine, never dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// Bet id not present in the ledger.
    #[error("bet {0} not found in ledger")]
    BetNotFound(Uuid),

    /// Bet still pending; crash resolution has not run.
    #[error("bet {0} is still unresolved")]
    BetUnresolved(Uuid),
}

/// Kind of balance movement, recorded per transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// Stake debit at bet placement.
    Bet,
    /// Payout credit at cash-out.
    Win,
    /// External funding credit.
    Deposit,
}

/// One balance movement, with before/after amounts for reconciliation.
#[derive(Debug, Clone, Serialize)]
pub struct Transaction {
    /// Affected owner.
    pub owner: OwnerId,
    /// What kind of movement.
    pub kind: TransactionKind,
    /// Currency moved.
    pub currency: Currency,
    /// Signed amount: negative for debits.
    pub amount: Decimal,
    /// Balance before the movement.
    pub balance_before: Decimal,
    /// Balance after the movement.
    pub balance_after: Decimal,
    /// Round the movement belongs to, if any.
    pub round_id: Option<RoundId>,
}

/// Per-owner balances.
#[derive(Debug, Clone, Default)]
struct Wallet {
    ton: Decimal,
    stars: Decimal,
}

impl Wallet {
    fn get(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Ton => self.ton,
            Currency::Stars => self.stars,
        }
    }

    fn get_mut(&mut self, currency: Currency) -> &mut Decimal {
        match currency {
            Currency::Ton => &mut self.ton,
            Currency::Stars => &mut self.stars,
        }
    }
}

/// The bet ledger for one table.
#[derive(Debug, Default)]
pub struct BetLedger {
    limits: BetLimits,
    balances: BTreeMap<OwnerId, Wallet>,
    /// Bets for the current round, in placement order.
    bets: Vec<Bet>,
    transactions: Vec<Transaction>,
}

impl BetLedger {
    /// Create a ledger with the given stake limits.
    pub fn new(limits: BetLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    /// Current balance for an owner.
    pub fn balance(&self, owner: OwnerId, currency: Currency) -> Decimal {
        self.balances
            .get(&owner)
            .map(|w| w.get(currency))
            .unwrap_or(Decimal::ZERO)
    }

    /// Credit an owner from an external source (deposit, bonus).
    pub fn deposit(&mut self, owner: OwnerId, amount: Decimal, currency: Currency) {
        self.credit(owner, amount, currency, TransactionKind::Deposit, None);
    }

    /// Place a bet on a pending round. Debits the stake atomically with
    /// bet creation.
    pub fn place_bet(
        &mut self,
        owner: OwnerId,
        round: &Round,
        amount: Decimal,
        currency: Currency,
        auto_cashout: Option<Decimal>,
    ) -> Result<Bet, BetError> {
        if round.phase() != RoundPhase::Pending {
            return Err(PhaseError {
                round_id: round.id(),
                expected: RoundPhase::Pending,
                actual: round.phase(),
            }
            .into());
        }

        if amount <= Decimal::ZERO {
            return Err(BetError::Validation("bet amount must be positive".into()));
        }
        let (min, max) = self.limits.range(currency);
        if amount < min {
            return Err(BetError::Validation(format!(
                "minimum bet is {min} {currency}"
            )));
        }
        if amount > max {
            return Err(BetError::Validation(format!(
                "maximum bet is {max} {currency}"
            )));
        }
        if let Some(threshold) = auto_cashout {
            if threshold < Decimal::new(101, 2) {
                return Err(BetError::Validation(
                    "auto-cashout must be at least 1.01".into(),
                ));
            }
        }

        if self
            .bets
            .iter()
            .any(|b| b.owner == owner && b.round_id == round.id())
        {
            return Err(BetError::DuplicateBet);
        }

        if self.balance(owner, currency) < amount {
            return Err(BetError::InsufficientFunds { currency });
        }

        self.debit(owner, amount, currency, Some(round.id()));

        let bet = Bet {
            id: Uuid::new_v4(),
            owner,
            round_id: round.id(),
            amount,
            currency,
            auto_cashout,
            cashout_multiplier: None,
            payout: None,
            status: BetStatus::Pending,
            settled: false,
        };
        self.bets.push(bet.clone());
        Ok(bet)
    }

    /// Manually cash out an owner's open bet at the given multiplier.
    ///
    /// The caller (the engine) is responsible for `multiplier` being the
    /// current tick value and strictly below the crash point.
    pub fn cashout(
        &mut self,
        owner: OwnerId,
        round: &Round,
        multiplier: Decimal,
    ) -> Result<CashoutReceipt, BetError> {
        if round.phase() != RoundPhase::Running {
            return Err(PhaseError {
                round_id: round.id(),
                expected: RoundPhase::Running,
                actual: round.phase(),
            }
            .into());
        }

        let idx = self
            .bets
            .iter()
            .position(|b| {
                b.owner == owner && b.round_id == round.id() && b.status == BetStatus::Pending
            })
            .ok_or(BetError::NoActiveBet)?;

        Ok(self.cash_out_at(idx, multiplier))
    }

    /// Evaluate auto-cashouts against the current tick multiplier.
    ///
    /// Every open bet whose threshold is at or below `tick_multiplier` is
    /// cashed out at its own threshold (not the tick value), in placement
    /// order. Called on every tick, so thresholds between two ticks still
    /// pay the threshold the player asked for.
    pub fn apply_auto_cashouts(
        &mut self,
        round_id: RoundId,
        tick_multiplier: Decimal,
    ) -> Vec<CashoutReceipt> {
        let mut receipts = Vec::new();
        for idx in 0..self.bets.len() {
            let eligible = {
                let bet = &self.bets[idx];
                bet.round_id == round_id
                    && bet.status == BetStatus::Pending
                    && bet.auto_cashout.is_some_and(|t| t <= tick_multiplier)
            };
            if eligible {
                let threshold = self.bets[idx].auto_cashout.unwrap_or(tick_multiplier);
                receipts.push(self.cash_out_at(idx, threshold));
            }
        }
        receipts
    }

    /// Mark every bet still open for the round as lost. Called at the
    /// `running -> crashed` transition, after the final auto-cashout pass.
    pub fn resolve_crash(&mut self, round_id: RoundId, crash_multiplier: Decimal) -> Vec<Bet> {
        let mut lost = Vec::new();
        for bet in &mut self.bets {
            if bet.round_id == round_id && bet.status == BetStatus::Pending {
                bet.status = BetStatus::Lost;
                bet.cashout_multiplier = Some(crash_multiplier);
                bet.payout = Some(Decimal::ZERO);
                lost.push(bet.clone());
            }
        }
        lost
    }

    /// Finalize a resolved bet during settlement.
    pub fn settle_bet(&mut self, bet_id: Uuid) -> Result<Bet, SettlementError> {
        let bet = self
            .bets
            .iter_mut()
            .find(|b| b.id == bet_id)
            .ok_or(SettlementError::BetNotFound(bet_id))?;
        if bet.status == BetStatus::Pending {
            return Err(SettlementError::BetUnresolved(bet_id));
        }
        bet.settled = true;
        Ok(bet.clone())
    }

    /// Ids of all bets for a round, in placement order.
    pub fn round_bet_ids(&self, round_id: RoundId) -> Vec<Uuid> {
        self.bets
            .iter()
            .filter(|b| b.round_id == round_id)
            .map(|b| b.id)
            .collect()
    }

    /// Remove and return a round's bets once settlement is complete.
    pub fn drain_round(&mut self, round_id: RoundId) -> Vec<Bet> {
        let (drained, kept): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.bets)
                .into_iter()
                .partition(|b| b.round_id == round_id);
        self.bets = kept;
        drained
    }

    /// An owner's bet for a round, if any.
    pub fn bet_for(&self, owner: OwnerId, round_id: RoundId) -> Option<&Bet> {
        self.bets
            .iter()
            .find(|b| b.owner == owner && b.round_id == round_id)
    }

    /// Number of open bets for a round.
    pub fn open_bet_count(&self, round_id: RoundId) -> usize {
        self.bets
            .iter()
            .filter(|b| b.round_id == round_id && b.status == BetStatus::Pending)
            .count()
    }

    /// Transaction log for an owner, oldest first.
    pub fn transactions_for(&self, owner: OwnerId) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| t.owner == owner)
            .collect()
    }

    fn cash_out_at(&mut self, idx: usize, multiplier: Decimal) -> CashoutReceipt {
        let (owner, round_id, amount, currency, bet_id) = {
            let bet = &self.bets[idx];
            (bet.owner, bet.round_id, bet.amount, bet.currency, bet.id)
        };

        let payout =
            (amount * multiplier).round_dp_with_strategy(2, RoundingStrategy::ToZero);

        {
            let bet = &mut self.bets[idx];
            bet.status = BetStatus::Won;
            bet.cashout_multiplier = Some(multiplier);
            bet.payout = Some(payout);
        }

        self.credit(owner, payout, currency, TransactionKind::Win, Some(round_id));

        CashoutReceipt {
            bet_id,
            owner,
            round_id,
            multiplier,
            payout,
            currency,
        }
    }

    fn debit(&mut self, owner: OwnerId, amount: Decimal, currency: Currency, round_id: Option<RoundId>) {
        let wallet = self.balances.entry(owner).or_default();
        let before = wallet.get(currency);
        *wallet.get_mut(currency) = before - amount;
        self.transactions.push(Transaction {
            owner,
            kind: TransactionKind::Bet,
            currency,
            amount: -amount,
            balance_before: before,
            balance_after: before - amount,
            round_id,
        });
    }

    fn credit(
        &mut self,
        owner: OwnerId,
        amount: Decimal,
        currency: Currency,
        kind: TransactionKind,
        round_id: Option<RoundId>,
    ) {
        let wallet = self.balances.entry(owner).or_default();
        let before = wallet.get(currency);
        *wallet.get_mut(currency) = before + amount;
        self.transactions.push(Transaction {
            owner,
            kind,
            currency,
            amount,
            balance_before: before,
            balance_after: before + amount,
            round_id,
        });
    }
}

// =============================================================================
// TESTS
// =============================================================================
