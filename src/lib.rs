//! # Crashpoint Game Server
//!
//! Authoritative round engine for a provably-fair crash betting game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CRASHPOINT SERVER                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  fair/           - Provably-fair primitives                  │
//! │  ├── seed.rs     - Server/client seed generation             │
//! │  ├── derive.rs   - Seed -> crash multiplier derivation       │
//! │  └── verify.rs   - Stateless post-hoc round verification     │
//! │                                                              │
//! │  game/           - Round engine (authoritative)              │
//! │  ├── round.rs    - Round lifecycle and seed-reveal rules     │
//! │  ├── curve.rs    - Multiplier-vs-time curve                  │
//! │  ├── ledger.rs   - Bets, balances, payouts                   │
//! │  ├── events.rs   - Ordered per-round event stream            │
//! │  ├── history.rs  - Archive of settled rounds                 │
//! │  └── engine.rs   - Single-writer table loop                  │
//! │                                                              │
//! │  network/        - Networking (non-deterministic)            │
//! │  ├── server.rs   - WebSocket server                          │
//! │  ├── protocol.rs - Message types                             │
//! │  └── auth.rs     - JWT validation                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Fairness Guarantee
//!
//! The `fair/` module is pure and deterministic: the crash multiplier is a
//! function of (server seed, client seed, round id) only, the server seed is
//! committed to (SHA-256) before a round opens for betting, and both seeds
//! are revealed at the moment of the crash. Any client can re-derive the
//! multiplier from the revealed values and compare it against the published
//! commitment with [`fair::verify::verify_round`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod fair;
pub mod game;
pub mod network;

// Re-export commonly used types
pub use fair::derive::{crash_point, DeriveConfig};
pub use fair::seed::ServerSeed;
pub use fair::verify::{verify_round, VerifyOutcome};
pub use game::engine::{EngineConfig, GameTable};
pub use game::ledger::{Currency, OwnerId};
pub use game::round::{RoundId, RoundPhase};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Interval between multiplier ticks (milliseconds)
pub const TICK_INTERVAL_MS: u64 = 100;

/// Betting window before a round starts (seconds)
pub const BETTING_WINDOW_SECS: u64 = 5;

/// Cooldown between settlement and the next betting window (seconds)
pub const COOLDOWN_SECS: u64 = 3;
