//! Runtime configuration for the control core.
//!
//! These are the structs the state machines consume. They are separate from
//! the TOML-deserialized config in `putt_config`; see `conversions`.

use putt_traits::ChipConfig;

use crate::types::NUM_COLUMNS;

/// Course actuation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ActuatorCfg {
    /// Upper bound for every requested position.
    pub max_position: u8,
    /// Maximum change of one actuator per control pass.
    pub step: u8,
    /// Number of groups written per pass.
    pub rollout_groups: usize,
    /// Pause between two groups in the same pass.
    pub rollout_delay_ms: u64,
    /// Servo channels used per chip (channel 0 is left free).
    pub channels_per_chip: u8,
    /// Driver chips in hardware-group order.
    pub chips: Vec<ChipConfig>,
    /// Time between two columns of the clear sweep.
    pub clear_column_delay_ms: u64,
    /// Position written to every hole of column `i` during the sweep.
    pub clear_positions: [u8; NUM_COLUMNS],
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        let chip = |address| ChipConfig {
            address,
            osc_freq_hz: 25_000_000.0,
            pwm_freq_hz: 50.0,
        };
        Self {
            max_position: 90,
            step: 5,
            rollout_groups: 5,
            rollout_delay_ms: 20,
            channels_per_chip: 15,
            chips: vec![chip(0x40), chip(0x41), chip(0x42)],
            clear_column_delay_ms: 2_000,
            clear_positions: [90; NUM_COLUMNS],
        }
    }
}

/// Debounce settings of one switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorCfg {
    pub debounce_ms: u64,
    /// The switch reads low while a ball is present.
    pub active_low: bool,
}

impl SensorCfg {
    pub const fn new(debounce_ms: u64) -> Self {
        Self {
            debounce_ms,
            active_low: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorsCfg {
    pub ball_in_hole: SensorCfg,
    pub ball_in_gutter: SensorCfg,
    pub ball_departure: SensorCfg,
    pub ball_queue: SensorCfg,
}

impl Default for SensorsCfg {
    fn default() -> Self {
        Self {
            ball_in_hole: SensorCfg::new(10),
            ball_in_gutter: SensorCfg::new(15),
            ball_departure: SensorCfg::new(10),
            ball_queue: SensorCfg::new(15),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimationCfg {
    /// Start with automatic re-dispense after a miss.
    pub auto_dispense: bool,
    /// A departed ball that is not seen again within this is stuck.
    pub in_transit_timeout_ms: u64,
    /// A sunk ball must reach the gutter within this.
    pub feed_error_timeout_ms: u64,
}

impl Default for EstimationCfg {
    fn default() -> Self {
        Self {
            auto_dispense: false,
            in_transit_timeout_ms: 5_000,
            feed_error_timeout_ms: 7_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueCfg {
    /// Run time of the return motor per sunk ball.
    pub ball_in_hole_feedforward_ms: u64,
    /// Longest wait between two balls reaching the player.
    pub player_return_timeout_ms: u64,
}

impl Default for QueueCfg {
    fn default() -> Self {
        Self {
            ball_in_hole_feedforward_ms: 5_000,
            player_return_timeout_ms: 5_000,
        }
    }
}

/// Periods of the three tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerCfg {
    pub sensor_period_ms: u64,
    pub control_period_ms: u64,
    pub queue_period_ms: u64,
}

impl Default for SchedulerCfg {
    fn default() -> Self {
        Self {
            sensor_period_ms: 1,
            control_period_ms: 10,
            queue_period_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoreConfig {
    pub actuators: ActuatorCfg,
    pub sensors: SensorsCfg,
    pub estimation: EstimationCfg,
    pub queue: QueueCfg,
    pub scheduler: SchedulerCfg,
}
