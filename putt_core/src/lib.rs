#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Control core of the robotic putting course (hardware-agnostic).
//!
//! All hardware goes through the seams in `putt_traits`: PWM chips
//! (`ActuatorDriver`), flash (`CourseStore`), dispensing motors (`Motor`) and
//! switch inputs (`DigitalInput`).
//!
//! ## Architecture
//!
//! - **Sensors**: edge-armed, poll-confirmed debounce (`sensors`)
//! - **Ball estimation**: one ball's life-cycle and hit/sunk counters (`estimation`)
//! - **Ball queue**: the two dispensing motors (`queue`)
//! - **Actuator control**: course shape, rate limiting, clear sweep, persistence
//!   (`actuator`, `rollout`)
//! - **Composition**: three periodic tasks (`scheduler`, `system`) and the
//!   byte payloads of the remote API (`payload`)
//!
//! Each state machine owns its context; other tasks talk to it only through
//! its cloneable handle.

pub mod actuator;
pub mod config;
pub mod conversions;
pub mod error;
pub mod error_codes;
pub mod estimation;
mod fsm;
pub mod hw_error;
pub mod mocks;
pub mod payload;
pub mod queue;
pub mod rollout;
pub mod scheduler;
pub mod sensors;
pub mod system;
pub mod timer;
pub mod types;
pub mod util;

pub use actuator::{ActuatorControl, ActuatorHandle, ActuatorState};
pub use config::{
    ActuatorCfg, CoreConfig, EstimationCfg, QueueCfg, SchedulerCfg, SensorCfg, SensorsCfg,
};
pub use error::{BuildError, CourseError, Result};
pub use error_codes::{AtomicErrorCodes, ErrorCode, ErrorReporter};
pub use estimation::{BallEstimation, EstimationHandle, EstimationState};
pub use payload::{Command, Controller};
pub use queue::{BallQueue, QueueHandle, QueueState};
pub use rollout::{RolloutPlan, ServoAddress};
pub use scheduler::PeriodicTask;
pub use sensors::{DebouncedSensor, SensorBank, SensorId, SensorPoller};
pub use system::{CourseSystem, CourseSystemBuilder, RunningSystem, TaskStats};
pub use timer::Timer;
pub use types::{BallStats, CoursePositions, Mode, NUM_ACTUATORS, NUM_COLUMNS, NUM_ROWS};
