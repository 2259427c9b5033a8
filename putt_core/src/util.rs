//! Small numeric helpers for course control.

use std::time::Duration;

/// Move `current` toward `desired` by at most `step`, landing exactly on the
/// target. A zero step is treated as one.
#[inline]
pub fn step_toward(current: u8, desired: u8, step: u8) -> u8 {
    let step = step.max(1);
    if current < desired {
        current.saturating_add(step).min(desired)
    } else {
        current.saturating_sub(step).max(desired)
    }
}

/// Clamp every position to `max`.
pub fn clamp_positions<const N: usize>(positions: &mut [u8; N], max: u8) {
    for p in positions.iter_mut() {
        *p = (*p).min(max);
    }
}

/// Task period from a millisecond setting, never zero.
#[inline]
pub fn period(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}
