#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the putting-course controller.
//!
//! - `Config` and its sections are deserialized from TOML; every section is
//!   optional and falls back to the tuned defaults below.
//! - `Config::validate()` rejects values the state machines cannot honour.
//!
//! Course geometry (9 rows x 5 columns) is fixed and not configurable here.
use serde::Deserialize;
use std::path::Path;

/// Actuators on the course; must match the firmware geometry.
pub const NUM_ACTUATORS: usize = 45;
/// Columns swept by the clear sequence.
pub const NUM_COLUMNS: usize = 5;
/// Channels per PWM chip, including the reserved channel 0.
pub const CHIP_CHANNELS: u8 = 16;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Actuators {
    /// Upper clamp for every course-state value.
    pub max_position: u8,
    /// Max change of a single actuator per control tick.
    pub step: u8,
    /// Number of sequentially driven rollout groups (must divide 45).
    pub rollout_groups: usize,
    /// Delay between rollout groups (ms).
    pub rollout_delay_ms: u64,
    /// Usable actuator channels per chip; channel 0 is reserved.
    pub channels_per_chip: u8,
    pub chip_addresses: Vec<u8>,
    pub osc_freq_hz: f32,
    pub pwm_freq_hz: f32,
    /// Dwell per column during a clear sweep (ms).
    pub clear_column_delay_ms: u64,
    /// Sweep position for each column.
    pub clear_positions: Vec<u8>,
}

impl Default for Actuators {
    fn default() -> Self {
        Self {
            max_position: 90,
            step: 5,
            rollout_groups: 5,
            rollout_delay_ms: 20,
            channels_per_chip: 15,
            chip_addresses: vec![0x40, 0x41, 0x42],
            osc_freq_hz: 25_000_000.0,
            pwm_freq_hz: 50.0,
            clear_column_delay_ms: 2000,
            clear_positions: vec![90; NUM_COLUMNS],
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct Sensor {
    /// Minimum stable time before an edge is trusted (ms).
    pub debounce_ms: u64,
    /// Switch pulls the line low when triggered.
    pub active_low: bool,
}

impl Sensor {
    const fn with_window(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            active_low: true,
        }
    }
}

impl Default for Sensor {
    fn default() -> Self {
        Self::with_window(10)
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sensors {
    pub ball_in_hole: Sensor,
    pub ball_in_gutter: Sensor,
    pub ball_departure: Sensor,
    pub ball_queue: Sensor,
}

impl Default for Sensors {
    fn default() -> Self {
        Self {
            ball_in_hole: Sensor::with_window(10),
            ball_in_gutter: Sensor::with_window(15),
            ball_departure: Sensor::with_window(10),
            ball_queue: Sensor::with_window(15),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Estimation {
    pub auto_dispense: bool,
    pub in_transit_timeout_ms: u64,
    pub feed_error_timeout_ms: u64,
}

impl Default for Estimation {
    fn default() -> Self {
        Self {
            auto_dispense: false,
            in_transit_timeout_ms: 5000,
            feed_error_timeout_ms: 7000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Queue {
    /// Feed-forward run time of the hole-return motor per request (ms).
    pub ball_in_hole_feedforward_ms: u64,
    /// Max time between two dispensed balls before the player return fails (ms).
    pub player_return_timeout_ms: u64,
}

impl Default for Queue {
    fn default() -> Self {
        Self {
            ball_in_hole_feedforward_ms: 5000,
            player_return_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Motors {
    /// Chip whose reserved channel drives the hole-return motor.
    pub ball_in_hole_chip: u8,
    /// Chip whose reserved channel drives the player-return motor.
    pub player_chip: u8,
    pub run_position: u8,
    pub stop_position: u8,
}

impl Default for Motors {
    fn default() -> Self {
        Self {
            ball_in_hole_chip: 0x40,
            player_chip: 0x41,
            run_position: 255,
            stop_position: 128,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Scheduler {
    pub sensor_period_ms: u64,
    pub control_period_ms: u64,
    pub queue_period_ms: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            sensor_period_ms: 1,
            control_period_ms: 10,
            queue_period_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// Where the 45-byte course shape is persisted.
    pub course_state_path: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            course_state_path: "course_state.bin".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub actuators: Actuators,
    pub sensors: Sensors,
    pub estimation: Estimation,
    pub queue: Queue,
    pub motors: Motors,
    pub scheduler: Scheduler,
    pub storage: Storage,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file. A missing file yields the defaults.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {}: {}", path.display(), e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {}: {}", path.display(), e))
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Actuators
        let a = &self.actuators;
        if a.max_position == 0 {
            eyre::bail!("actuators.max_position must be > 0");
        }
        if a.step == 0 {
            eyre::bail!("actuators.step must be > 0");
        }
        if a.rollout_groups == 0 || NUM_ACTUATORS % a.rollout_groups != 0 {
            eyre::bail!("actuators.rollout_groups must divide {NUM_ACTUATORS}");
        }
        if a.rollout_delay_ms > 1000 {
            eyre::bail!("actuators.rollout_delay_ms is unreasonably large (>1s)");
        }
        if a.channels_per_chip == 0 || a.channels_per_chip >= CHIP_CHANNELS {
            eyre::bail!(
                "actuators.channels_per_chip must be in [1, {}]",
                CHIP_CHANNELS - 1
            );
        }
        let capacity = a.chip_addresses.len() * usize::from(a.channels_per_chip);
        if capacity < NUM_ACTUATORS {
            eyre::bail!(
                "actuators.chip_addresses provide {capacity} channels, need {NUM_ACTUATORS}"
            );
        }
        for (i, addr) in a.chip_addresses.iter().enumerate() {
            if a.chip_addresses[..i].contains(addr) {
                eyre::bail!("actuators.chip_addresses contains duplicate 0x{addr:02x}");
            }
        }
        if !(a.osc_freq_hz.is_finite() && a.osc_freq_hz > 0.0) {
            eyre::bail!("actuators.osc_freq_hz must be > 0");
        }
        if !(24.0..=1526.0).contains(&a.pwm_freq_hz) {
            eyre::bail!("actuators.pwm_freq_hz must be in [24, 1526]");
        }
        if a.clear_column_delay_ms == 0 {
            eyre::bail!("actuators.clear_column_delay_ms must be >= 1");
        }
        if a.clear_positions.len() != NUM_COLUMNS {
            eyre::bail!("actuators.clear_positions must have {NUM_COLUMNS} entries");
        }
        if a.clear_positions.iter().any(|&p| p > a.max_position) {
            eyre::bail!("actuators.clear_positions must not exceed actuators.max_position");
        }

        // Sensors
        for (name, s) in [
            ("ball_in_hole", &self.sensors.ball_in_hole),
            ("ball_in_gutter", &self.sensors.ball_in_gutter),
            ("ball_departure", &self.sensors.ball_departure),
            ("ball_queue", &self.sensors.ball_queue),
        ] {
            if s.debounce_ms == 0 {
                eyre::bail!("sensors.{name}.debounce_ms must be >= 1");
            }
            if s.debounce_ms > 1000 {
                eyre::bail!("sensors.{name}.debounce_ms is unreasonably large (>1s)");
            }
        }

        // Estimation
        if self.estimation.in_transit_timeout_ms == 0 {
            eyre::bail!("estimation.in_transit_timeout_ms must be >= 1");
        }
        if self.estimation.feed_error_timeout_ms == 0 {
            eyre::bail!("estimation.feed_error_timeout_ms must be >= 1");
        }

        // Queue
        if self.queue.ball_in_hole_feedforward_ms == 0 {
            eyre::bail!("queue.ball_in_hole_feedforward_ms must be >= 1");
        }
        if self.queue.player_return_timeout_ms == 0 {
            eyre::bail!("queue.player_return_timeout_ms must be >= 1");
        }

        // Motors
        for (name, chip) in [
            ("ball_in_hole_chip", self.motors.ball_in_hole_chip),
            ("player_chip", self.motors.player_chip),
        ] {
            if !a.chip_addresses.contains(&chip) {
                eyre::bail!("motors.{name} 0x{chip:02x} is not in actuators.chip_addresses");
            }
        }
        if self.motors.ball_in_hole_chip == self.motors.player_chip {
            eyre::bail!("motors.ball_in_hole_chip and motors.player_chip must differ");
        }

        // Scheduler
        let s = &self.scheduler;
        if s.sensor_period_ms == 0 || s.control_period_ms == 0 || s.queue_period_ms == 0 {
            eyre::bail!("scheduler periods must be >= 1");
        }
        if s.control_period_ms % s.sensor_period_ms != 0
            || s.queue_period_ms % s.control_period_ms != 0
        {
            eyre::bail!(
                "scheduler periods must be harmonic (control a multiple of sensor, queue a multiple of control)"
            );
        }

        // Storage
        if self.storage.course_state_path.trim().is_empty() {
            eyre::bail!("storage.course_state_path must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {rot}");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().expect("defaults validate");
    }

    #[test]
    fn empty_document_yields_defaults() {
        let cfg = load_toml("").expect("parse empty");
        assert_eq!(cfg.actuators.max_position, 90);
        assert_eq!(cfg.sensors.ball_in_gutter.debounce_ms, 15);
        assert!(cfg.sensors.ball_queue.active_low);
        assert_eq!(cfg.scheduler.queue_period_ms, 100);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = load_file(Path::new("/definitely/not/here.toml")).expect("defaults");
        assert_eq!(cfg.queue.player_return_timeout_ms, 5000);
    }
}
