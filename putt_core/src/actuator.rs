//! Course-shape control: requested positions, rate-limited motion, the
//! column-by-column clear sweep, and persistence of the desired shape.
//!
//! One [`ActuatorControl::run`] is one pass
//! `ModeSelect -> {clear sweep | StaticControl} -> MoveActuators`.
//! Requests from other tasks land in a small locked request block owned by
//! [`ActuatorHandle`] and only flow into the desired positions under control
//! of the state machine.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use eyre::WrapErr;
use putt_traits::{ActuatorDriver, Clock, CourseStore};

use crate::config::ActuatorCfg;
use crate::error::{CourseError, Result};
use crate::error_codes::{ErrorCode, ErrorReporter};
use crate::fsm::{Machine, Step, drive};
use crate::hw_error::map_hw_error;
use crate::rollout::RolloutPlan;
use crate::timer::Timer;
use crate::types::{CoursePositions, Mode, NUM_ACTUATORS, NUM_COLUMNS, NUM_ROWS, actuator_index};
use crate::util::{clamp_positions, step_toward};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorState {
    Idle,
    ModeSelect,
    ClearSequenceOnEnter,
    ClearSequenceMode,
    StaticControl,
    MoveActuators,
}

#[derive(Debug, Clone, Copy)]
struct ClearSequence {
    active: bool,
    column: usize,
    /// Unset until column 0 has been written.
    timer: Option<Timer>,
}

#[derive(Debug)]
struct Requests {
    requested: CoursePositions,
    pending: bool,
    save: bool,
    mode: Mode,
    clear: bool,
}

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    current: CoursePositions,
    desired: CoursePositions,
    mode: Mode,
    clear_active: bool,
    write_failures: u64,
}

#[derive(Debug)]
struct Shared {
    max_position: u8,
    requests: Mutex<Requests>,
    snapshot: Mutex<Snapshot>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable entry point for course updates from other tasks.
#[derive(Debug, Clone)]
pub struct ActuatorHandle {
    shared: Arc<Shared>,
}

impl ActuatorHandle {
    /// Request a new course shape. Values above the configured maximum are
    /// clamped; the shape is persisted once the control task applies it.
    pub fn update_desired_positions(&self, positions: &[u8]) -> std::result::Result<(), CourseError> {
        if positions.len() != NUM_ACTUATORS {
            return Err(CourseError::Payload(format!(
                "course state needs {NUM_ACTUATORS} positions, got {}",
                positions.len()
            )));
        }
        let mut requested = [0u8; NUM_ACTUATORS];
        requested.copy_from_slice(positions);
        clamp_positions(&mut requested, self.shared.max_position);

        let mut r = lock(&self.shared.requests);
        r.requested = requested;
        r.pending = true;
        r.save = true;
        Ok(())
    }

    /// Takes effect at the next mode selection.
    pub fn update_mode(&self, mode: Mode) {
        lock(&self.shared.requests).mode = mode;
    }

    /// Start the clear sweep; ignored while one is running.
    pub fn request_clear_sequence(&self) {
        lock(&self.shared.requests).clear = true;
    }

    /// A requested shape has not been applied yet.
    pub fn pending_update(&self) -> bool {
        lock(&self.shared.requests).pending
    }

    pub fn current_positions(&self) -> CoursePositions {
        lock(&self.shared.snapshot).current
    }

    pub fn desired_positions(&self) -> CoursePositions {
        lock(&self.shared.snapshot).desired
    }

    pub fn mode(&self) -> Mode {
        lock(&self.shared.snapshot).mode
    }

    pub fn clear_active(&self) -> bool {
        lock(&self.shared.snapshot).clear_active
    }

    /// Position commands the driver rejected.
    pub fn write_failures(&self) -> u64 {
        lock(&self.shared.snapshot).write_failures
    }
}

pub struct ActuatorControl<D: ActuatorDriver, S: CourseStore> {
    state: ActuatorState,
    mode: Mode,
    current: CoursePositions,
    desired: CoursePositions,
    clear: ClearSequence,
    cfg: ActuatorCfg,
    plan: RolloutPlan,
    driver: D,
    store: S,
    write_failures: u64,
    shared: Arc<Shared>,
    errors: Arc<dyn ErrorReporter + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<D: ActuatorDriver, S: CourseStore> ActuatorControl<D, S> {
    pub fn new(
        cfg: ActuatorCfg,
        driver: D,
        store: S,
        errors: Arc<dyn ErrorReporter + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> std::result::Result<Self, CourseError> {
        let addresses: Vec<u8> = cfg.chips.iter().map(|c| c.address).collect();
        let plan = RolloutPlan::new(
            NUM_ACTUATORS,
            cfg.rollout_groups,
            cfg.channels_per_chip,
            &addresses,
        )?;
        let zeros = [0u8; NUM_ACTUATORS];
        let shared = Arc::new(Shared {
            max_position: cfg.max_position,
            requests: Mutex::new(Requests {
                requested: zeros,
                pending: false,
                save: false,
                mode: Mode::Static,
                clear: false,
            }),
            snapshot: Mutex::new(Snapshot {
                current: zeros,
                desired: zeros,
                mode: Mode::Static,
                clear_active: false,
                write_failures: 0,
            }),
        });
        Ok(Self {
            state: ActuatorState::Idle,
            mode: Mode::Static,
            current: zeros,
            desired: zeros,
            clear: ClearSequence {
                active: false,
                column: 0,
                timer: None,
            },
            cfg,
            plan,
            driver,
            store,
            write_failures: 0,
            shared,
            errors,
            clock,
        })
    }

    pub fn handle(&self) -> ActuatorHandle {
        ActuatorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Bring up the driver chips, restore the persisted shape and command it.
    pub fn init(&mut self) -> Result<()> {
        for chip in &self.cfg.chips {
            self.driver
                .init(*chip)
                .map_err(|e| map_hw_error(&*e))
                .wrap_err_with(|| format!("init PWM chip 0x{:02x}", chip.address))?;
        }
        self.restore();
        self.roll_out();
        self.publish();
        Ok(())
    }

    /// One control pass.
    pub fn run(&mut self) {
        drive(self);
        self.publish();
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn current_positions(&self) -> &CoursePositions {
        &self.current
    }

    pub fn desired_positions(&self) -> &CoursePositions {
        &self.desired
    }

    pub fn plan(&self) -> &RolloutPlan {
        &self.plan
    }

    pub fn clear_active(&self) -> bool {
        self.clear.active
    }

    pub fn clear_column(&self) -> usize {
        self.clear.column
    }

    fn restore(&mut self) {
        match self.store.read_course_state() {
            Ok(bytes) if bytes.len() == NUM_ACTUATORS => {
                let mut p = [0u8; NUM_ACTUATORS];
                p.copy_from_slice(&bytes);
                clamp_positions(&mut p, self.cfg.max_position);
                self.current = p;
                self.desired = p;
                lock(&self.shared.requests).requested = p;
                tracing::info!("course state restored");
            }
            // A never-saved store reads back empty and lands here too.
            Ok(bytes) => {
                tracing::warn!(
                    len = bytes.len(),
                    expected = NUM_ACTUATORS,
                    "stored course state has wrong size; starting flat"
                );
                self.errors.set_error(ErrorCode::Storage);
            }
            Err(e) => {
                tracing::warn!(error = %e, "course state read failed");
                self.errors.set_error(ErrorCode::Storage);
            }
        }
    }

    fn persist(&mut self) {
        match self.store.write_course_state(&self.desired) {
            Ok(()) => tracing::debug!("course state saved"),
            Err(e) => {
                tracing::error!(error = %e, "course state write failed");
                self.errors.set_error(ErrorCode::Storage);
            }
        }
    }

    /// Command every actuator, one rollout group at a time.
    fn roll_out(&mut self) {
        let delay = Duration::from_millis(self.cfg.rollout_delay_ms);
        for (g, members) in self.plan.groups().enumerate() {
            if g > 0 && !delay.is_zero() {
                self.clock.sleep(delay);
            }
            for i in members {
                let Some(addr) = self.plan.address(i) else {
                    continue;
                };
                if let Err(e) = self
                    .driver
                    .set_position(addr.chip_address, addr.channel, self.current[i])
                {
                    self.write_failures += 1;
                    tracing::warn!(
                        actuator = i,
                        chip = addr.chip_address,
                        channel = addr.channel,
                        error = %e,
                        "position write failed"
                    );
                }
            }
        }
    }

    fn publish(&self) {
        let mut s = lock(&self.shared.snapshot);
        s.current = self.current;
        s.desired = self.desired;
        s.mode = self.mode;
        s.clear_active = self.clear.active;
        s.write_failures = self.write_failures;
    }

    fn mode_select(&mut self) -> Step<ActuatorState> {
        let (clear_requested, mode) = {
            let mut r = lock(&self.shared.requests);
            (std::mem::take(&mut r.clear), r.mode)
        };
        if clear_requested || self.clear.active {
            return Step::Continue(ActuatorState::ClearSequenceOnEnter);
        }
        if mode != self.mode {
            tracing::info!(?mode, "mode changed");
            self.mode = mode;
        }
        match self.mode {
            Mode::Static => Step::Continue(ActuatorState::StaticControl),
        }
    }

    fn clear_on_enter(&mut self) -> Step<ActuatorState> {
        if !self.clear.active {
            {
                let mut r = lock(&self.shared.requests);
                // A newer request wins over the shape being swept away.
                if !r.pending {
                    r.requested = self.desired;
                    r.pending = true;
                }
            }
            self.clear = ClearSequence {
                active: true,
                column: 0,
                timer: None,
            };
            tracing::info!("clear sequence started");
        }
        Step::Continue(ActuatorState::ClearSequenceMode)
    }

    fn clear_mode(&mut self) -> Step<ActuatorState> {
        let due = self
            .clear
            .timer
            .is_none_or(|t| t.reached(&*self.clock, self.cfg.clear_column_delay_ms));
        if due {
            if self.clear.column >= NUM_COLUMNS {
                self.clear.active = false;
                self.clear.timer = None;
                tracing::info!("clear sequence complete");
                return Step::Continue(ActuatorState::ModeSelect);
            }
            let col = self.clear.column;
            let position = self.cfg.clear_positions[col].min(self.cfg.max_position);
            for row in 0..NUM_ROWS {
                self.desired[actuator_index(row, col)] = position;
            }
            tracing::debug!(column = col, position, "clear column");
            self.clear.column += 1;
            self.clear.timer = Some(Timer::restart(&*self.clock));
        }
        Step::Continue(ActuatorState::MoveActuators)
    }

    fn static_control(&mut self) -> Step<ActuatorState> {
        let save = {
            let mut r = lock(&self.shared.requests);
            if r.pending {
                self.desired = r.requested;
                r.pending = false;
                std::mem::take(&mut r.save)
            } else {
                false
            }
        };
        if save {
            self.persist();
        }
        Step::Continue(ActuatorState::MoveActuators)
    }

    fn move_actuators(&mut self) -> Step<ActuatorState> {
        let mut changed = false;
        for (cur, &want) in self.current.iter_mut().zip(self.desired.iter()) {
            let next = step_toward(*cur, want, self.cfg.step);
            if next != *cur {
                *cur = next;
                changed = true;
            }
        }
        if changed {
            self.roll_out();
        }
        Step::Yield(ActuatorState::ModeSelect)
    }
}

impl<D: ActuatorDriver, S: CourseStore> Machine for ActuatorControl<D, S> {
    type State = ActuatorState;
    const NAME: &'static str = "actuator_control";

    fn state(&self) -> ActuatorState {
        self.state
    }

    fn set_state(&mut self, s: ActuatorState) {
        self.state = s;
    }

    fn handle(&mut self, s: ActuatorState) -> Step<ActuatorState> {
        match s {
            ActuatorState::Idle => Step::Continue(ActuatorState::ModeSelect),
            ActuatorState::ModeSelect => self.mode_select(),
            ActuatorState::ClearSequenceOnEnter => self.clear_on_enter(),
            ActuatorState::ClearSequenceMode => self.clear_mode(),
            ActuatorState::StaticControl => self.static_control(),
            ActuatorState::MoveActuators => self.move_actuators(),
        }
    }
}
