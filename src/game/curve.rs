//! Multiplier Curve
//!
//! Maps elapsed round time to the displayed multiplier. The curve is linear:
//! +0.01x per `base_speed_ms` milliseconds, starting from 1.00. It is a pure
//! function of elapsed time, so every tick computation is reproducible and
//! the time at which any target multiplier is reached can be inverted
//! exactly.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Hundredths of a multiplier per curve step.
const STEP: Decimal = Decimal::from_parts(1, 0, 0, false, 2); // 0.01

/// The multiplier-vs-time curve for a table.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplierCurve {
    /// Milliseconds per +0.01x step.
    base_speed_ms: u64,
}

impl Default for MultiplierCurve {
    fn default() -> Self {
        Self { base_speed_ms: 100 }
    }
}

impl MultiplierCurve {
    /// Create a curve with the given step duration. A zero step is clamped
    /// to 1ms rather than dividing by zero.
    pub fn new(base_speed_ms: u64) -> Self {
        Self {
            base_speed_ms: base_speed_ms.max(1),
        }
    }

    /// Multiplier after `elapsed_ms` of running time, uncapped.
    ///
    /// Truncated to two decimal places, so the value only moves when a full
    /// step has elapsed. Monotonically non-decreasing in `elapsed_ms`.
    pub fn multiplier_at(&self, elapsed_ms: u64) -> Decimal {
        let steps = Decimal::from(elapsed_ms) / Decimal::from(self.base_speed_ms);
        (Decimal::ONE + steps * STEP).round_dp_with_strategy(2, RoundingStrategy::ToZero)
    }

    /// Multiplier after `elapsed_ms`, capped at the round's crash point.
    pub fn multiplier_at_capped(&self, elapsed_ms: u64, crash_point: Decimal) -> Decimal {
        self.multiplier_at(elapsed_ms).min(crash_point)
    }

    /// Milliseconds of running time until `target` is first reached.
    ///
    /// Returns 0 for targets at or below 1.00.
    pub fn time_to_multiplier(&self, target: Decimal) -> u64 {
        if target <= Decimal::ONE {
            return 0;
        }
        let steps = (target - Decimal::ONE) / STEP;
        let ms = steps.ceil() * Decimal::from(self.base_speed_ms);
        ms.to_u64().unwrap_or(u64::MAX)
    }
}

// =============================================================================
// TESTS
// =============================================================================
