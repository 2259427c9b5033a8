//! Latched fault flags surfaced to the remote client.

use std::sync::atomic::{AtomicBool, Ordering};

/// Faults the core can raise. The discriminant is the byte position in the
/// error payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorCode {
    /// Estimation counters were inconsistent and had to be clamped.
    BallMath = 0,
    /// A sunk ball never reached the gutter feed in time.
    BallInHoleFeed = 1,
    /// The player queue motor ran without a ball arriving.
    PlayerBallReturn = 2,
    /// Reading or writing persisted course state failed.
    Storage = 3,
}

impl ErrorCode {
    pub const COUNT: usize = 4;
    pub const ALL: [ErrorCode; Self::COUNT] = [
        ErrorCode::BallMath,
        ErrorCode::BallInHoleFeed,
        ErrorCode::PlayerBallReturn,
        ErrorCode::Storage,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            ErrorCode::BallMath => "ball_math",
            ErrorCode::BallInHoleFeed => "ball_in_hole_feed",
            ErrorCode::PlayerBallReturn => "player_ball_return",
            ErrorCode::Storage => "storage",
        }
    }
}

/// Sink for fault flags. Flags stay set until explicitly cleared.
pub trait ErrorReporter {
    fn set_error(&self, code: ErrorCode);
    fn clear_error(&self, code: ErrorCode);
    fn clear_all(&self);
    fn get_all(&self) -> [bool; ErrorCode::COUNT];
}

/// Lock-free error register shared by every task.
#[derive(Debug, Default)]
pub struct AtomicErrorCodes {
    flags: [AtomicBool; ErrorCode::COUNT],
}

impl AtomicErrorCodes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, code: ErrorCode) -> bool {
        self.flags[code.index()].load(Ordering::Acquire)
    }

    /// Names of the currently raised codes, in payload order.
    pub fn active(&self) -> Vec<&'static str> {
        ErrorCode::ALL
            .iter()
            .filter(|c| self.is_set(**c))
            .map(|c| c.name())
            .collect()
    }
}

impl ErrorReporter for AtomicErrorCodes {
    fn set_error(&self, code: ErrorCode) {
        if !self.flags[code.index()].swap(true, Ordering::AcqRel) {
            tracing::warn!(code = code.name(), "error raised");
        }
    }

    fn clear_error(&self, code: ErrorCode) {
        self.flags[code.index()].store(false, Ordering::Release);
    }

    fn clear_all(&self) {
        for f in &self.flags {
            f.store(false, Ordering::Release);
        }
    }

    fn get_all(&self) -> [bool; ErrorCode::COUNT] {
        std::array::from_fn(|i| self.flags[i].load(Ordering::Acquire))
    }
}
