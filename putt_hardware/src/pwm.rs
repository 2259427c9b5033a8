//! Simulated PWM driver bank and the adapters built on top of it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use putt_traits::{ActuatorDriver, BoxError, ChipConfig, Motor};

use crate::error::{HwError, Result};

/// Channels per chip (0..=15).
pub const CHANNELS: u8 = 16;

/// Channel the continuous-rotation motors are wired to.
pub const MOTOR_CHANNEL: u8 = 0;

/// Counter resolution of one PWM period.
const PWM_STEPS: f32 = 4096.0;

/// Servo pulse width at position 0 and 255.
const PULSE_MIN_US: f32 = 1_000.0;
const PULSE_MAX_US: f32 = 2_000.0;

/// Prescaler for the requested output frequency, or `None` if the chip
/// cannot produce it (register range 3..=255).
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn prescale(osc_freq_hz: f32, pwm_freq_hz: f32) -> Option<u8> {
    let value = (osc_freq_hz / (PWM_STEPS * pwm_freq_hz)).round() - 1.0;
    (3.0..=255.0).contains(&value).then_some(value as u8)
}

/// Off-tick for a servo position: 0..=255 maps linearly onto a 1-2 ms pulse.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn pulse_ticks(position: u8, pwm_freq_hz: f32) -> u16 {
    let pulse_us = PULSE_MIN_US + f32::from(position) * (PULSE_MAX_US - PULSE_MIN_US) / 255.0;
    let ticks = (pulse_us * PWM_STEPS * pwm_freq_hz / 1_000_000.0).round();
    ticks.clamp(0.0, PWM_STEPS - 1.0) as u16
}

/// One accepted `set_position` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PwmCommand {
    pub chip: u8,
    pub channel: u8,
    pub position: u8,
    pub off_ticks: u16,
}

#[derive(Debug, Clone, Copy)]
struct ChipState {
    prescale: u8,
    pwm_freq_hz: f32,
}

/// In-memory bank of PWM chips.
#[derive(Debug, Default)]
pub struct SimulatedPwm {
    chips: HashMap<u8, ChipState>,
    positions: HashMap<(u8, u8), u8>,
    log: Vec<PwmCommand>,
}

impl SimulatedPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self, chip: u8) -> bool {
        self.chips.contains_key(&chip)
    }

    /// Initialised chip addresses, sorted.
    pub fn chips(&self) -> Vec<u8> {
        let mut v: Vec<u8> = self.chips.keys().copied().collect();
        v.sort_unstable();
        v
    }

    pub fn prescaler(&self, chip: u8) -> Option<u8> {
        self.chips.get(&chip).map(|c| c.prescale)
    }

    /// Last position commanded on a channel.
    pub fn position(&self, chip: u8, channel: u8) -> Option<u8> {
        self.positions.get(&(chip, channel)).copied()
    }

    /// Every accepted write, oldest first.
    pub fn log(&self) -> &[PwmCommand] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn write(&mut self, chip: u8, channel: u8, position: u8) -> Result<()> {
        let state = *self.chips.get(&chip).ok_or(HwError::UnknownChip(chip))?;
        if channel >= CHANNELS {
            return Err(HwError::InvalidChannel(channel));
        }
        let cmd = PwmCommand {
            chip,
            channel,
            position,
            off_ticks: pulse_ticks(position, state.pwm_freq_hz),
        };
        tracing::trace!(chip, channel, position, off_ticks = cmd.off_ticks, "pwm write");
        self.positions.insert((chip, channel), position);
        self.log.push(cmd);
        Ok(())
    }
}

impl ActuatorDriver for SimulatedPwm {
    fn init(&mut self, chip: ChipConfig) -> std::result::Result<(), BoxError> {
        let prescale =
            prescale(chip.osc_freq_hz, chip.pwm_freq_hz).ok_or(HwError::InvalidFrequency {
                freq_hz: chip.pwm_freq_hz,
                osc_hz: chip.osc_freq_hz,
            })?;
        tracing::debug!(
            chip = format_args!("0x{:02x}", chip.address),
            prescale,
            freq_hz = chip.pwm_freq_hz,
            "pwm chip up"
        );
        self.chips.insert(
            chip.address,
            ChipState {
                prescale,
                pwm_freq_hz: chip.pwm_freq_hz,
            },
        );
        Ok(())
    }

    fn set_position(
        &mut self,
        chip_address: u8,
        channel: u8,
        position: u8,
    ) -> std::result::Result<(), BoxError> {
        self.write(chip_address, channel, position)?;
        Ok(())
    }
}

/// One bus shared by the actuator loop and both motors.
#[derive(Debug, Default)]
pub struct SharedDriver<D> {
    inner: Arc<Mutex<D>>,
}

impl<D> Clone for SharedDriver<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D> SharedDriver<D> {
    pub fn new(driver: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Run `f` with the bus held.
    pub fn with<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

impl<D: ActuatorDriver> ActuatorDriver for SharedDriver<D> {
    fn init(&mut self, chip: ChipConfig) -> std::result::Result<(), BoxError> {
        self.with(|d| d.init(chip))
    }

    fn set_position(
        &mut self,
        chip_address: u8,
        channel: u8,
        position: u8,
    ) -> std::result::Result<(), BoxError> {
        self.with(|d| d.set_position(chip_address, channel, position))
    }
}

/// Continuous-rotation servo on the reserved channel of a chip, driven as an
/// on/off motor.
#[derive(Debug)]
pub struct ContinuousServo<D> {
    driver: D,
    chip_address: u8,
    run_position: u8,
    stop_position: u8,
    running: bool,
}

impl<D: ActuatorDriver> ContinuousServo<D> {
    pub fn new(driver: D, chip_address: u8, run_position: u8, stop_position: u8) -> Self {
        Self {
            driver,
            chip_address,
            run_position,
            stop_position,
            running: false,
        }
    }

    pub fn chip_address(&self) -> u8 {
        self.chip_address
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl<D: ActuatorDriver> Motor for ContinuousServo<D> {
    fn start(&mut self) -> std::result::Result<(), BoxError> {
        self.driver
            .set_position(self.chip_address, MOTOR_CHANNEL, self.run_position)?;
        self.running = true;
        tracing::debug!(chip = format_args!("0x{:02x}", self.chip_address), "servo motor on");
        Ok(())
    }

    fn stop(&mut self) -> std::result::Result<(), BoxError> {
        self.driver
            .set_position(self.chip_address, MOTOR_CHANNEL, self.stop_position)?;
        self.running = false;
        tracing::debug!(chip = format_args!("0x{:02x}", self.chip_address), "servo motor off");
        Ok(())
    }
}
