//! Byte payloads of the remote API and the [`Controller`] that applies them.
//!
//! | request        | body                                    |
//! |----------------|-----------------------------------------|
//! | course state   | mode byte, then one byte per actuator   |
//! | dispense       | one byte, balls to dispense (0..=10)    |
//! | settings       | one byte, auto-dispense 1/0             |
//! | stats (read)   | balls hit, balls in hole (saturating)   |
//! | errors (read)  | one 0/1 byte per error code             |

use std::sync::Arc;

use crate::actuator::ActuatorHandle;
use crate::error::CourseError;
use crate::error_codes::{AtomicErrorCodes, ErrorCode, ErrorReporter};
use crate::estimation::EstimationHandle;
use crate::queue::QueueHandle;
use crate::types::{BallStats, CoursePositions, Mode, NUM_ACTUATORS};

/// Most balls a single dispense request may ask for.
pub const MAX_DISPENSE_BALLS: u8 = 10;
/// Length of a course-state body.
pub const COURSE_STATE_LEN: usize = NUM_ACTUATORS + 1;

/// A decoded remote request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetCourse {
        mode: Mode,
        positions: CoursePositions,
    },
    Dispense {
        balls: u8,
    },
    Settings {
        auto_dispense: bool,
    },
    ResetStats,
    ClearSequence,
}

fn expect_len(what: &str, body: &[u8], len: usize) -> Result<(), CourseError> {
    if body.len() == len {
        Ok(())
    } else {
        Err(CourseError::Payload(format!(
            "{what} body must be {len} bytes, got {}",
            body.len()
        )))
    }
}

pub fn decode_course_state(body: &[u8]) -> Result<Command, CourseError> {
    expect_len("course state", body, COURSE_STATE_LEN)?;
    let mode = Mode::try_from(body[0])?;
    let mut positions = [0u8; NUM_ACTUATORS];
    positions.copy_from_slice(&body[1..]);
    Ok(Command::SetCourse { mode, positions })
}

pub fn decode_dispense(body: &[u8]) -> Result<Command, CourseError> {
    expect_len("dispense", body, 1)?;
    let balls = body[0];
    if balls > MAX_DISPENSE_BALLS {
        return Err(CourseError::Payload(format!(
            "dispense count {balls} exceeds {MAX_DISPENSE_BALLS}"
        )));
    }
    Ok(Command::Dispense { balls })
}

pub fn decode_settings(body: &[u8]) -> Result<Command, CourseError> {
    expect_len("settings", body, 1)?;
    match body[0] {
        0 => Ok(Command::Settings {
            auto_dispense: false,
        }),
        1 => Ok(Command::Settings {
            auto_dispense: true,
        }),
        other => Err(CourseError::Payload(format!(
            "settings flag must be 0 or 1, got {other}"
        ))),
    }
}

pub fn encode_course_state(mode: Mode, positions: &CoursePositions) -> [u8; COURSE_STATE_LEN] {
    let mut out = [0u8; COURSE_STATE_LEN];
    out[0] = mode.as_byte();
    out[1..].copy_from_slice(positions);
    out
}

pub fn encode_stats(stats: BallStats) -> [u8; 2] {
    let sat = |v: u32| u8::try_from(v).unwrap_or(u8::MAX);
    [sat(stats.balls_hit), sat(stats.balls_in_hole)]
}

pub fn encode_errors(flags: [bool; ErrorCode::COUNT]) -> [u8; ErrorCode::COUNT] {
    flags.map(u8::from)
}

/// Routes decoded commands to the running state machines.
#[derive(Clone)]
pub struct Controller {
    actuators: ActuatorHandle,
    estimation: EstimationHandle,
    queue: QueueHandle,
    errors: Arc<AtomicErrorCodes>,
}

impl Controller {
    pub fn new(
        actuators: ActuatorHandle,
        estimation: EstimationHandle,
        queue: QueueHandle,
        errors: Arc<AtomicErrorCodes>,
    ) -> Self {
        Self {
            actuators,
            estimation,
            queue,
            errors,
        }
    }

    pub fn apply(&self, cmd: &Command) -> Result<(), CourseError> {
        match cmd {
            Command::SetCourse { mode, positions } => {
                self.actuators.update_mode(*mode);
                self.actuators.update_desired_positions(positions)?;
                tracing::info!(?mode, "course update queued");
            }
            Command::Dispense { balls } => {
                self.queue.request_player_balls(u32::from(*balls));
                tracing::info!(balls, "dispense requested");
            }
            Command::Settings { auto_dispense } => {
                self.estimation.set_auto_dispense(*auto_dispense);
                tracing::info!(auto_dispense, "settings updated");
            }
            Command::ResetStats => self.estimation.reset_stats(),
            Command::ClearSequence => self.actuators.request_clear_sequence(),
        }
        Ok(())
    }

    pub fn actuators(&self) -> &ActuatorHandle {
        &self.actuators
    }

    pub fn estimation(&self) -> &EstimationHandle {
        &self.estimation
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn errors(&self) -> &Arc<AtomicErrorCodes> {
        &self.errors
    }

    pub fn stats_payload(&self) -> [u8; 2] {
        encode_stats(self.estimation.stats())
    }

    pub fn error_payload(&self) -> [u8; ErrorCode::COUNT] {
        encode_errors(self.errors.get_all())
    }

    /// Mode byte plus the shape the controller is steering toward.
    pub fn course_payload(&self) -> [u8; COURSE_STATE_LEN] {
        encode_course_state(self.actuators.mode(), &self.actuators.desired_positions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn course_state_decodes_mode_and_positions() {
        let mut body = vec![0u8; COURSE_STATE_LEN];
        body[1] = 90;
        body[COURSE_STATE_LEN - 1] = 42;
        match decode_course_state(&body).unwrap() {
            Command::SetCourse { mode, positions } => {
                assert_eq!(mode, Mode::Static);
                assert_eq!(positions[0], 90);
                assert_eq!(positions[NUM_ACTUATORS - 1], 42);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn stats_saturate_at_one_byte() {
        let s = BallStats {
            balls_hit: 300,
            balls_in_hole: 12,
        };
        assert_eq!(encode_stats(s), [255, 12]);
    }

    #[test]
    fn error_flags_become_bytes() {
        assert_eq!(encode_errors([true, false, false, true]), [1, 0, 0, 1]);
    }
}
