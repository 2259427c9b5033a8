#![allow(dead_code)]

use std::collections::HashMap;

use putt_core::mocks::{MemoryStore, RecordingDriver, ScriptedInput, SpyMotor};
use putt_core::{Controller, CoreConfig, CourseSystem, SensorId};
use putt_traits::ManualClock;

/// A fully wired system on mocks and a manual clock.
pub struct Rig {
    pub sys: CourseSystem,
    pub ctl: Controller,
    pub clock: ManualClock,
    pub driver: RecordingDriver,
    pub store: MemoryStore,
    pub ball_in_hole_motor: SpyMotor,
    pub player_motor: SpyMotor,
    pub inputs: HashMap<SensorId, ScriptedInput>,
}

pub fn test_config() -> CoreConfig {
    let mut cfg = CoreConfig::default();
    cfg.actuators.rollout_delay_ms = 0;
    cfg
}

pub fn rig(cfg: CoreConfig) -> Rig {
    let clock = ManualClock::new();
    let driver = RecordingDriver::new();
    let store = MemoryStore::new();
    let ball_in_hole_motor = SpyMotor::new();
    let player_motor = SpyMotor::new();
    let inputs: HashMap<SensorId, ScriptedInput> = SensorId::ALL
        .into_iter()
        .map(|id| (id, ScriptedInput::new()))
        .collect();

    let mut builder = CourseSystem::builder()
        .with_config(cfg)
        .with_clock(clock.clone())
        .with_driver(driver.clone())
        .with_store(store.clone())
        .with_ball_in_hole_motor(ball_in_hole_motor.clone())
        .with_player_motor(player_motor.clone());
    for (id, input) in &inputs {
        builder = builder.with_input(*id, input.clone());
    }
    let mut sys = builder.build().expect("build");
    sys.init().expect("init");
    let ctl = sys.controller();
    Rig {
        sys,
        ctl,
        clock,
        driver,
        store,
        ball_in_hole_motor,
        player_motor,
        inputs,
    }
}

impl Rig {
    /// Drive one switch through a clean press: edge, stable low for longer
    /// than any window, confirm, release.
    pub fn pulse(&mut self, id: SensorId) {
        let input = &self.inputs[&id];
        input.set_high(false);
        self.sys.sensors().arm(id);
        self.clock.advance_ms(20);
        self.sys.tick_sensors();
        input.set_high(true);
        assert!(self.sys.sensors().get(id), "{} not confirmed", id.name());
    }

    /// An edge followed by the line bouncing back before the window ends.
    pub fn glitch(&mut self, id: SensorId) {
        let input = &self.inputs[&id];
        input.set_high(false);
        self.sys.sensors().arm(id);
        input.set_high(true);
        self.clock.advance_ms(1);
        self.sys.tick_sensors();
    }

    pub fn control_tick(&mut self) {
        self.clock.advance_ms(10);
        self.sys.tick_control();
    }

    pub fn control_ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.control_tick();
        }
    }

    pub fn queue_tick(&mut self) {
        self.clock.advance_ms(100);
        self.sys.tick_queue();
    }
}
