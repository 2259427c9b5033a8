//! Millisecond timers over an injectable clock.

use std::time::Instant;

use putt_traits::Clock;

/// A restartable stopwatch. Elapsed values are floored and never go
/// backwards, so comparisons against a bound use `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timer {
    started: Instant,
}

impl Timer {
    /// A timer started at `clock.now()`.
    pub fn restart(clock: &dyn Clock) -> Self {
        Self {
            started: clock.now(),
        }
    }

    pub fn elapsed_ms(&self, clock: &dyn Clock) -> u64 {
        clock.ms_since(self.started)
    }

    pub fn elapsed_us(&self, clock: &dyn Clock) -> u64 {
        clock.us_since(self.started)
    }

    /// True once at least `bound_ms` has passed.
    pub fn reached(&self, clock: &dyn Clock, bound_ms: u64) -> bool {
        self.elapsed_ms(clock) >= bound_ms
    }
}
