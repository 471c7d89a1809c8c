//! Provably-fair primitives.
//!
//! Everything in this module is pure and deterministic. Given the same
//! seeds and round id, [`derive::crash_point`] produces the same multiplier
//! bit-for-bit on any platform, and [`verify::verify_round`] re-derives it
//! from revealed values without touching any server state.

pub mod derive;
pub mod seed;
pub mod verify;
