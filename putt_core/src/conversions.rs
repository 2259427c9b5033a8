//! `From` implementations bridging `putt_config` types to `putt_core` types.

use putt_traits::ChipConfig;

use crate::config::{
    ActuatorCfg, CoreConfig, EstimationCfg, QueueCfg, SchedulerCfg, SensorCfg, SensorsCfg,
};
use crate::types::NUM_COLUMNS;

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&putt_config::Actuators> for ActuatorCfg {
    fn from(c: &putt_config::Actuators) -> Self {
        let chips = c
            .chip_addresses
            .iter()
            .map(|&address| ChipConfig {
                address,
                osc_freq_hz: c.osc_freq_hz,
                pwm_freq_hz: c.pwm_freq_hz,
            })
            .collect();
        // Validated to one entry per column; a short list falls back to max.
        let clear_positions: [u8; NUM_COLUMNS] = std::array::from_fn(|i| {
            c.clear_positions
                .get(i)
                .copied()
                .unwrap_or(c.max_position)
        });
        Self {
            max_position: c.max_position,
            step: c.step,
            rollout_groups: c.rollout_groups,
            rollout_delay_ms: c.rollout_delay_ms,
            channels_per_chip: c.channels_per_chip,
            chips,
            clear_column_delay_ms: c.clear_column_delay_ms,
            clear_positions,
        }
    }
}

// ── SensorsCfg ───────────────────────────────────────────────────────────────

impl From<&putt_config::Sensor> for SensorCfg {
    fn from(c: &putt_config::Sensor) -> Self {
        Self {
            debounce_ms: c.debounce_ms,
            active_low: c.active_low,
        }
    }
}

impl From<&putt_config::Sensors> for SensorsCfg {
    fn from(c: &putt_config::Sensors) -> Self {
        Self {
            ball_in_hole: (&c.ball_in_hole).into(),
            ball_in_gutter: (&c.ball_in_gutter).into(),
            ball_departure: (&c.ball_departure).into(),
            ball_queue: (&c.ball_queue).into(),
        }
    }
}

// ── EstimationCfg / QueueCfg / SchedulerCfg ──────────────────────────────────

impl From<&putt_config::Estimation> for EstimationCfg {
    fn from(c: &putt_config::Estimation) -> Self {
        Self {
            auto_dispense: c.auto_dispense,
            in_transit_timeout_ms: c.in_transit_timeout_ms,
            feed_error_timeout_ms: c.feed_error_timeout_ms,
        }
    }
}

impl From<&putt_config::Queue> for QueueCfg {
    fn from(c: &putt_config::Queue) -> Self {
        Self {
            ball_in_hole_feedforward_ms: c.ball_in_hole_feedforward_ms,
            player_return_timeout_ms: c.player_return_timeout_ms,
        }
    }
}

impl From<&putt_config::Scheduler> for SchedulerCfg {
    fn from(c: &putt_config::Scheduler) -> Self {
        Self {
            sensor_period_ms: c.sensor_period_ms,
            control_period_ms: c.control_period_ms,
            queue_period_ms: c.queue_period_ms,
        }
    }
}

// ── CoreConfig ───────────────────────────────────────────────────────────────

impl From<&putt_config::Config> for CoreConfig {
    fn from(c: &putt_config::Config) -> Self {
        Self {
            actuators: (&c.actuators).into(),
            sensors: (&c.sensors).into(),
            estimation: (&c.estimation).into(),
            queue: (&c.queue).into(),
            scheduler: (&c.scheduler).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_across_layers() {
        let from_file = CoreConfig::from(&putt_config::Config::default());
        assert_eq!(from_file, CoreConfig::default());
    }

    #[test]
    fn chip_settings_fan_out_to_every_address() {
        let mut c = putt_config::Actuators::default();
        c.chip_addresses = vec![0x50, 0x51, 0x52, 0x53];
        c.pwm_freq_hz = 60.0;
        let a = ActuatorCfg::from(&c);
        assert_eq!(a.chips.len(), 4);
        assert!(a.chips.iter().all(|ch| (ch.pwm_freq_hz - 60.0).abs() < f32::EPSILON));
        assert_eq!(a.chips[3].address, 0x53);
    }
}
