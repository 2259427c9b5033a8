//! Wires the simulated peripherals into a `CourseSystem`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use putt_config::Config;
use putt_core::{CoreConfig, CourseSystem, SensorId};
use putt_hardware::{ContinuousServo, FileCourseStore, SharedDriver, SimulatedInput, SimulatedPwm};
use putt_traits::{Clock, MonotonicClock};

/// A built system plus the handles the CLI keeps to poke the simulation.
pub struct SimCourse {
    pub system: CourseSystem,
    pub bus: SharedDriver<SimulatedPwm>,
    pub inputs: HashMap<SensorId, SimulatedInput>,
}

pub fn build(cfg: &Config) -> eyre::Result<SimCourse> {
    let bus = SharedDriver::new(SimulatedPwm::new());
    let m = &cfg.motors;
    let inputs: HashMap<SensorId, SimulatedInput> = SensorId::ALL
        .into_iter()
        .map(|id| (id, SimulatedInput::new()))
        .collect();

    let mut builder = CourseSystem::builder()
        .with_config(CoreConfig::from(cfg))
        .with_clock(MonotonicClock::new())
        .with_driver(bus.clone())
        .with_store(FileCourseStore::new(&cfg.storage.course_state_path))
        .with_ball_in_hole_motor(ContinuousServo::new(
            bus.clone(),
            m.ball_in_hole_chip,
            m.run_position,
            m.stop_position,
        ))
        .with_player_motor(ContinuousServo::new(
            bus.clone(),
            m.player_chip,
            m.run_position,
            m.stop_position,
        ));
    for (id, input) in &inputs {
        builder = builder.with_input(*id, input.clone());
    }
    let system = builder.build()?;

    // Edge interrupts arm the matching sensor.
    let bank = system.sensors();
    for (id, input) in &inputs {
        let bank = Arc::clone(&bank);
        let id = *id;
        input.on_falling_edge(move || bank.arm(id));
    }

    Ok(SimCourse { system, bus, inputs })
}

/// Plays a golfer: every putt leaves the tee, odd ones drop in the hole and
/// come back through the gutter, even ones miss into the gutter.
pub fn play_putts(inputs: &HashMap<SensorId, SimulatedInput>, putts: u32, hold: Duration) {
    let clock = MonotonicClock::new();
    let press = |id: SensorId| {
        if let Some(input) = inputs.get(&id) {
            input.pulse(&clock, hold);
        }
    };
    for n in 1..=putts {
        press(SensorId::BallDeparture);
        clock.sleep(hold * 4);
        if n % 2 == 1 {
            press(SensorId::BallInHole);
            clock.sleep(hold * 4);
        }
        press(SensorId::BallInGutter);
        clock.sleep(hold * 4);
        tracing::debug!(putt = n, holed = n % 2 == 1, "simulated putt");
    }
}
