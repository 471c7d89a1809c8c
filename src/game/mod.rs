//! Round engine.
//!
//! The authoritative game logic: round lifecycle, multiplier curve, bet
//! ledger, event stream, and the single-writer table loop that drives them.

pub mod curve;
pub mod engine;
pub mod events;
pub mod history;
pub mod ledger;
pub mod round;
