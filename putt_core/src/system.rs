//! Wiring of the state machines into three periodic tasks.
//!
//! | task     | default period | body                                   |
//! |----------|----------------|----------------------------------------|
//! | sensors  | 1 ms           | `SensorPoller::run`                    |
//! | control  | 10 ms          | `ActuatorControl::run`, then `BallEstimation::run` |
//! | queue    | 100 ms         | `BallQueue::run`                       |
//!
//! `CourseSystem` can also be ticked by hand, which is how the tests drive it
//! against a `ManualClock`.

use std::sync::Arc;

use eyre::WrapErr;
use putt_traits::{ActuatorDriver, Clock, CourseStore, DigitalInput, MonotonicClock, Motor};

use crate::actuator::ActuatorControl;
use crate::config::{CoreConfig, SchedulerCfg};
use crate::error::{BuildError, Result};
use crate::error_codes::{AtomicErrorCodes, ErrorReporter};
use crate::estimation::{BallEstimation, EstimationHandle};
use crate::payload::Controller;
use crate::queue::{BallQueue, QueueHandle};
use crate::scheduler::PeriodicTask;
use crate::sensors::{SensorBank, SensorId, SensorPoller};
use crate::util::period;

type BoxDriver = Box<dyn ActuatorDriver + Send>;
type BoxStore = Box<dyn CourseStore + Send>;
type BoxMotor = Box<dyn Motor + Send>;
type BoxInput = Box<dyn DigitalInput + Send>;

/// Collects the hardware seams and configuration. All fields are validated
/// on `build()`.
#[derive(Default)]
pub struct CourseSystemBuilder {
    driver: Option<BoxDriver>,
    store: Option<BoxStore>,
    ball_in_hole_motor: Option<BoxMotor>,
    player_motor: Option<BoxMotor>,
    inputs: Vec<(SensorId, BoxInput)>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    config: CoreConfig,
}

impl CourseSystemBuilder {
    pub fn with_driver(mut self, driver: impl ActuatorDriver + Send + 'static) -> Self {
        self.driver = Some(Box::new(driver));
        self
    }

    pub fn with_store(mut self, store: impl CourseStore + Send + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_ball_in_hole_motor(mut self, motor: impl Motor + Send + 'static) -> Self {
        self.ball_in_hole_motor = Some(Box::new(motor));
        self
    }

    pub fn with_player_motor(mut self, motor: impl Motor + Send + 'static) -> Self {
        self.player_motor = Some(Box::new(motor));
        self
    }

    /// Raw line for `id`. A later call for the same sensor replaces it.
    pub fn with_input(mut self, id: SensorId, input: impl DigitalInput + Send + 'static) -> Self {
        self.inputs.retain(|(existing, _)| *existing != id);
        self.inputs.push((id, Box::new(input)));
        self
    }

    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> std::result::Result<CourseSystem, BuildError> {
        let driver = self.driver.ok_or(BuildError::MissingDriver)?;
        let store = self.store.ok_or(BuildError::MissingStore)?;
        let ball_in_hole_motor = self
            .ball_in_hole_motor
            .ok_or(BuildError::MissingMotor("ball-in-hole"))?;
        let player_motor = self.player_motor.ok_or(BuildError::MissingMotor("player"))?;
        if let Some(missing) = SensorId::ALL
            .into_iter()
            .find(|id| !self.inputs.iter().any(|(have, _)| have == id))
        {
            return Err(BuildError::MissingInput(missing));
        }
        let s = self.config.scheduler;
        if s.sensor_period_ms == 0 || s.control_period_ms == 0 || s.queue_period_ms == 0 {
            return Err(BuildError::InvalidConfig(
                "scheduler periods must be >= 1 ms".into(),
            ));
        }

        let clock: Arc<dyn Clock + Send + Sync> = match self.clock {
            Some(c) => c,
            None => Arc::new(MonotonicClock::new()),
        };
        let errors = Arc::new(AtomicErrorCodes::new());
        let reporter: Arc<dyn ErrorReporter + Send + Sync> = errors.clone();
        let sensors = Arc::new(SensorBank::new(&self.config.sensors, Arc::clone(&clock)));
        let queue_handle = QueueHandle::new();
        let estimation_handle = EstimationHandle::new(self.config.estimation.auto_dispense);

        let actuators = ActuatorControl::new(
            self.config.actuators,
            driver,
            store,
            Arc::clone(&reporter),
            Arc::clone(&clock),
        )
        .map_err(|e| BuildError::InvalidConfig(e.to_string()))?;
        let estimation = BallEstimation::new(
            self.config.estimation,
            &estimation_handle,
            Arc::clone(&sensors),
            queue_handle.clone(),
            Arc::clone(&reporter),
            Arc::clone(&clock),
        );
        let queue = BallQueue::new(
            self.config.queue,
            ball_in_hole_motor,
            player_motor,
            &queue_handle,
            Arc::clone(&sensors),
            reporter,
            clock,
        );
        let poller = SensorPoller::new(Arc::clone(&sensors), self.inputs);
        let controller = Controller::new(actuators.handle(), estimation_handle, queue_handle, errors);

        Ok(CourseSystem {
            actuators,
            estimation,
            queue,
            poller,
            sensors,
            controller,
            scheduler: s,
            initialized: false,
        })
    }
}

/// Fully wired but not yet running.
pub struct CourseSystem {
    actuators: ActuatorControl<BoxDriver, BoxStore>,
    estimation: BallEstimation,
    queue: BallQueue<BoxMotor, BoxMotor>,
    poller: SensorPoller,
    sensors: Arc<SensorBank>,
    controller: Controller,
    scheduler: SchedulerCfg,
    initialized: bool,
}

impl CourseSystem {
    pub fn builder() -> CourseSystemBuilder {
        CourseSystemBuilder::default()
    }

    /// Bring up the PWM chips and restore the stored course. Idempotent.
    pub fn init(&mut self) -> Result<()> {
        if !self.initialized {
            self.actuators.init().wrap_err("actuator init")?;
            self.initialized = true;
        }
        Ok(())
    }

    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    /// Edge callbacks arm sensors through this.
    pub fn sensors(&self) -> Arc<SensorBank> {
        Arc::clone(&self.sensors)
    }

    pub fn actuators(&self) -> &ActuatorControl<BoxDriver, BoxStore> {
        &self.actuators
    }

    pub fn estimation(&self) -> &BallEstimation {
        &self.estimation
    }

    pub fn queue(&self) -> &BallQueue<BoxMotor, BoxMotor> {
        &self.queue
    }

    pub fn tick_sensors(&mut self) {
        self.poller.run();
    }

    pub fn tick_control(&mut self) {
        self.actuators.run();
        self.estimation.run();
    }

    pub fn tick_queue(&mut self) {
        self.queue.run();
    }

    /// Initialise if needed and spawn the three tasks.
    pub fn start(mut self) -> Result<RunningSystem> {
        self.init()?;
        let Self {
            mut actuators,
            mut estimation,
            mut queue,
            mut poller,
            sensors,
            controller,
            scheduler,
            ..
        } = self;

        let sensor_task = PeriodicTask::spawn("sensors", period(scheduler.sensor_period_ms), move || {
            poller.run();
        })
        .wrap_err("spawn sensor task")?;
        let control_task =
            PeriodicTask::spawn("control", period(scheduler.control_period_ms), move || {
                actuators.run();
                estimation.run();
            })
            .wrap_err("spawn control task")?;
        let queue_task = PeriodicTask::spawn("queue", period(scheduler.queue_period_ms), move || {
            queue.run();
        })
        .wrap_err("spawn queue task")?;

        tracing::info!(
            sensor_ms = scheduler.sensor_period_ms,
            control_ms = scheduler.control_period_ms,
            queue_ms = scheduler.queue_period_ms,
            "course tasks running"
        );
        Ok(RunningSystem {
            controller,
            sensors,
            tasks: vec![sensor_task, control_task, queue_task],
        })
    }
}

/// Tick and overrun counts of one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskStats {
    pub name: &'static str,
    pub ticks: u64,
    pub overruns: u64,
}

pub struct RunningSystem {
    controller: Controller,
    sensors: Arc<SensorBank>,
    tasks: Vec<PeriodicTask>,
}

impl RunningSystem {
    pub fn controller(&self) -> Controller {
        self.controller.clone()
    }

    pub fn sensors(&self) -> Arc<SensorBank> {
        Arc::clone(&self.sensors)
    }

    pub fn task_stats(&self) -> Vec<TaskStats> {
        self.tasks
            .iter()
            .map(|t| TaskStats {
                name: t.name(),
                ticks: t.ticks(),
                overruns: t.overruns(),
            })
            .collect()
    }

    /// Stop all tasks (sensors first, queue last) and report their counters.
    pub fn shutdown(self) -> Vec<TaskStats> {
        let stats = self.task_stats();
        for task in self.tasks {
            task.stop();
        }
        tracing::info!("course tasks stopped");
        stats
    }
}
