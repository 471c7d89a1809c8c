//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with optional binary (bincode) for flat payload structs.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::game::engine::RoundStatus;
use crate::game::events::RoundEvent;
use crate::game::history::RoundRecord;
use crate::game::ledger::{BetError, BetErrorKind, Currency};
use crate::game::round::RoundId;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Authenticate with the server.
    Auth(AuthRequest),

    /// Place a bet on the current round.
    PlaceBet(BetRequest),

    /// Cash out the caller's open bet at the current multiplier.
    Cashout,

    /// Request current round status.
    GetRoundStatus,

    /// Request recent settled rounds.
    GetHistory {
        /// Maximum records to return.
        limit: Option<usize>,
    },

    /// Request the caller's balances.
    GetBalance,

    /// Verify a past round from its revealed values.
    Verify(VerifyRequest),

    /// Ping for latency measurement.
    Ping {
        /// Client timestamp, echoed back.
        timestamp: u64,
    },
}

/// Authentication request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthRequest {
    /// Authentication token (JWT).
    pub token: String,
    /// Client version for compatibility check.
    pub client_version: String,
}

/// Bet placement request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetRequest {
    /// Stake.
    pub amount: Decimal,
    /// Stake currency.
    pub currency: Currency,
    /// Optional automatic cash-out threshold, at least 1.01.
    pub auto_cashout: Option<Decimal>,
}

/// Round verification request with the values revealed at the crash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Commitment published at round start.
    pub server_seed_hash: String,
    /// Server seed revealed at the crash.
    pub server_seed: String,
    /// Client seed for the round.
    pub client_seed: String,
    /// Round identifier.
    pub round_id: RoundId,
    /// Multiplier the server broadcast.
    pub claimed_multiplier: Decimal,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Authentication result.
    AuthResult(AuthResult),

    /// Bet accepted and stake debited.
    BetAccepted {
        /// Assigned bet identifier.
        bet_id: String,
        /// Round the bet rides on.
        round_id: RoundId,
        /// Stake.
        amount: Decimal,
        /// Stake currency.
        currency: Currency,
    },

    /// Cash-out succeeded.
    CashoutResult {
        /// The cashed-out bet.
        bet_id: String,
        /// Multiplier locked in.
        multiplier: Decimal,
        /// Amount credited.
        payout: Decimal,
        /// Currency credited.
        currency: Currency,
    },

    /// Current round status.
    RoundStatus(RoundStatus),

    /// Recent settled rounds, newest first.
    History {
        /// The records.
        rounds: Vec<RoundRecord>,
    },

    /// The caller's balances.
    Balance {
        /// TON balance.
        ton: Decimal,
        /// STARS balance.
        stars: Decimal,
    },

    /// Round verification verdict.
    VerifyResult {
        /// Whether the round checks out.
        valid: bool,
        /// The multiplier re-derived from the submitted seeds.
        computed_multiplier: Decimal,
    },

    /// Round event from the broadcast stream.
    Event(RoundEvent),

    /// Pong response.
    Pong {
        /// Echo of the client timestamp.
        timestamp: u64,
        /// Server wall clock, milliseconds since the epoch.
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Operator-facing reason.
        reason: String,
    },
}

/// Authentication result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResult {
    /// Whether auth succeeded.
    pub success: bool,
    /// Authenticated owner id if successful.
    pub owner_id: Option<u64>,
    /// Error message if failed.
    pub error: Option<String>,
    /// Server version.
    pub server_version: String,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Authentication failed.
    AuthFailed,
    /// Not authenticated.
    NotAuthenticated,
    /// JWT token has expired.
    TokenExpired,
    /// Invalid JWT token (signature, format, claims).
    InvalidToken,
    /// Malformed message.
    InvalidInput,
    /// Bet or cash-out input rejected.
    ValidationError,
    /// Operation not valid in the round's current phase.
    PhaseError,
    /// Insufficient balance.
    FundsError,
    /// Internal error.
    InternalError,
}

impl From<&BetError> for ServerError {
    fn from(err: &BetError) -> Self {
        let code = match err.kind() {
            BetErrorKind::Validation => ErrorCode::ValidationError,
            BetErrorKind::Phase => ErrorCode::PhaseError,
            BetErrorKind::Funds => ErrorCode::FundsError,
        };
        ServerError {
            code,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl BetRequest {
    /// Serialize to binary.
    ///
    /// Only the flat payload structs support bincode; the tagged message
    /// enums travel as JSON.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::round::PhaseError;
    use crate::game::round::RoundPhase;

    #[test]
    fn test_client_message_json_roundtrip() {
        let msg = ClientMessage::PlaceBet(BetRequest {
            amount: Decimal::new(250, 2),
            currency: Currency::Ton,
            auto_cashout: Some(Decimal::new(200, 2)),
        });

        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"place_bet\""));
        assert!(json.contains("\"currency\":\"TON\""));

        let parsed = ClientMessage::from_json(&json).unwrap();
        if let ClientMessage::PlaceBet(bet) = parsed {
            assert_eq!(bet.amount, Decimal::new(250, 2));
            assert_eq!(bet.auto_cashout, Some(Decimal::new(200, 2)));
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_server_message_json_roundtrip() {
        let msg = ServerMessage::CashoutResult {
            bet_id: "b1".into(),
            multiplier: Decimal::new(217, 2),
            payout: Decimal::new(434, 2),
            currency: Currency::Stars,
        };

        let json = msg.to_json().unwrap();
        let parsed = ServerMessage::from_json(&json).unwrap();

        if let ServerMessage::CashoutResult { payout, currency, .. } = parsed {
            assert_eq!(payout, Decimal::new(434, 2));
            assert_eq!(currency, Currency::Stars);
        } else {
            panic!("Wrong message type");
        }
    }

    #[test]
    fn test_bet_error_mapping() {
        let cases = [
            (
                BetError::Validation("minimum bet is 0.01 TON".into()),
                ErrorCode::ValidationError,
            ),
            (
                BetError::InvalidPhase(PhaseError {
                    round_id: 1,
                    expected: RoundPhase::Pending,
                    actual: RoundPhase::Running,
                }),
                ErrorCode::PhaseError,
            ),
            (
                BetError::InsufficientFunds {
                    currency: Currency::Ton,
                },
                ErrorCode::FundsError,
            ),
            (BetError::DuplicateBet, ErrorCode::ValidationError),
        ];

        for (err, code) in cases {
            let server_error = ServerError::from(&err);
            assert_eq!(server_error.code, code);
            assert!(!server_error.message.is_empty());
        }
    }

    #[test]
    fn test_error_codes_snake_case() {
        let error = ServerError {
            code: ErrorCode::AuthFailed,
            message: "Invalid token".to_string(),
        };

        let msg = ServerMessage::Error(error);
        let json = msg.to_json().unwrap();
        assert!(json.contains("auth_failed"));
    }

    #[test]
    fn test_binary_serialization_bet_request() {
        let bet = BetRequest {
            amount: Decimal::new(100, 2),
            currency: Currency::Ton,
            auto_cashout: None,
        };

        let bytes = bet.to_bytes().unwrap();
        let parsed = BetRequest::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.amount, Decimal::new(100, 2));
        assert_eq!(parsed.currency, Currency::Ton);
    }

    #[test]
    fn test_event_passthrough() {
        let msg = ServerMessage::Event(RoundEvent::Crash {
            round_id: 9,
            multiplier: Decimal::new(312, 2),
            server_seed: "seed".into(),
            client_seed: "client".into(),
        });
        let json = msg.to_json().unwrap();
        assert!(json.contains("\"type\":\"event\""));
        assert!(json.contains("\"event\":\"crash\""));
        let _ = ServerMessage::from_json(&json).unwrap();
    }

    #[test]
    fn test_verify_request_roundtrip() {
        let msg = ClientMessage::Verify(VerifyRequest {
            server_seed_hash: "aa".repeat(32),
            server_seed: "bb".repeat(32),
            client_seed: "cc".repeat(16),
            round_id: 77,
            claimed_multiplier: Decimal::new(198, 2),
        });
        let json = msg.to_json().unwrap();
        let parsed = ClientMessage::from_json(&json).unwrap();
        assert!(matches!(parsed, ClientMessage::Verify(v) if v.round_id == 77));
    }
}
