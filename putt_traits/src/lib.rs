//! Narrow hardware seams for the putting-course controller.
//!
//! The core never talks to a bus, a GPIO line or flash directly; it goes
//! through these traits so the same state machines run against real
//! peripherals, the simulator in `putt_hardware`, or test doubles.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Static configuration of one PWM driver chip.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChipConfig {
    /// Bus address of the chip.
    pub address: u8,
    /// Measured oscillator frequency of the chip.
    pub osc_freq_hz: f32,
    /// Output PWM frequency (50 Hz for hobby servos).
    pub pwm_freq_hz: f32,
}

/// A bank of PWM driver chips that position servos.
pub trait ActuatorDriver {
    /// Bring up one chip (oscillator, prescaler, outputs).
    fn init(&mut self, chip: ChipConfig) -> Result<(), BoxError>;

    /// Command `channel` on the chip at `chip_address` to `position`.
    fn set_position(&mut self, chip_address: u8, channel: u8, position: u8)
    -> Result<(), BoxError>;
}

/// Non-volatile storage for the persisted course shape.
pub trait CourseStore {
    fn write_course_state(&mut self, state: &[u8]) -> Result<(), BoxError>;
    /// Return the stored blob as-is; the caller validates its length.
    fn read_course_state(&mut self) -> Result<Vec<u8>, BoxError>;
}

/// A continuous-rotation servo used as an on/off motor.
pub trait Motor {
    fn start(&mut self) -> Result<(), BoxError>;
    fn stop(&mut self) -> Result<(), BoxError>;
}

/// A raw digital input line.
pub trait DigitalInput {
    fn is_high(&self) -> Result<bool, BoxError>;
}

impl<T: ActuatorDriver + ?Sized> ActuatorDriver for Box<T> {
    fn init(&mut self, chip: ChipConfig) -> Result<(), BoxError> {
        (**self).init(chip)
    }

    fn set_position(
        &mut self,
        chip_address: u8,
        channel: u8,
        position: u8,
    ) -> Result<(), BoxError> {
        (**self).set_position(chip_address, channel, position)
    }
}

impl<T: CourseStore + ?Sized> CourseStore for Box<T> {
    fn write_course_state(&mut self, state: &[u8]) -> Result<(), BoxError> {
        (**self).write_course_state(state)
    }

    fn read_course_state(&mut self) -> Result<Vec<u8>, BoxError> {
        (**self).read_course_state()
    }
}

impl<T: Motor + ?Sized> Motor for Box<T> {
    fn start(&mut self) -> Result<(), BoxError> {
        (**self).start()
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        (**self).stop()
    }
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn is_high(&self) -> Result<bool, BoxError> {
        (**self).is_high()
    }
}
