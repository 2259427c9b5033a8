//! Course geometry and the small value types shared by the state machines.

use crate::error::CourseError;

/// Rows of holes on the course.
pub const NUM_ROWS: usize = 9;
/// Columns of holes; the clear sweep walks these.
pub const NUM_COLUMNS: usize = 5;
/// One servo per hole.
pub const NUM_ACTUATORS: usize = NUM_ROWS * NUM_COLUMNS;

/// One position per actuator, indexed `row * NUM_COLUMNS + column`.
pub type CoursePositions = [u8; NUM_ACTUATORS];

/// Index of the actuator at (`row`, `column`).
#[inline]
pub const fn actuator_index(row: usize, column: usize) -> usize {
    row * NUM_COLUMNS + column
}

/// Course actuation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Hold the last requested course shape.
    #[default]
    Static,
}

impl Mode {
    pub const fn as_byte(self) -> u8 {
        match self {
            Mode::Static => 0,
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = CourseError;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        match b {
            0 => Ok(Mode::Static),
            other => Err(CourseError::Payload(format!("unknown mode byte {other}"))),
        }
    }
}

/// Running game counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BallStats {
    pub balls_hit: u32,
    pub balls_in_hole: u32,
}

impl BallStats {
    pub fn record_hit(&mut self) {
        self.balls_hit = self.balls_hit.saturating_add(1);
    }

    /// Count a sunk ball. Returns `false` when the count had to be clamped to
    /// `balls_hit`.
    pub fn record_in_hole(&mut self) -> bool {
        self.balls_in_hole = self.balls_in_hole.saturating_add(1);
        if self.balls_in_hole > self.balls_hit {
            self.balls_in_hole = self.balls_hit;
            return false;
        }
        true
    }

    /// Pack both counters so readers always see a consistent pair.
    #[inline]
    #[allow(clippy::cast_lossless)]
    pub(crate) const fn pack(self) -> u64 {
        ((self.balls_hit as u64) << 32) | self.balls_in_hole as u64
    }

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn unpack(v: u64) -> Self {
        Self {
            balls_hit: (v >> 32) as u32,
            balls_in_hole: v as u32,
        }
    }
}
