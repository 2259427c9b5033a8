//! Simulated course peripherals behind the `putt_traits` seams: a bank of
//! PWM chips, continuous-rotation servo motors sharing that bus, switch
//! inputs with an edge interrupt, and file-backed course storage.

pub mod error;
pub mod input;
pub mod pwm;
pub mod store;

pub use error::HwError;
pub use input::SimulatedInput;
pub use pwm::{ContinuousServo, MOTOR_CHANNEL, PwmCommand, SharedDriver, SimulatedPwm};
pub use store::{FileCourseStore, write_atomic};
