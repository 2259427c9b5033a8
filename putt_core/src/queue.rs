//! The two ball-return motors.
//!
//! - **Ball-in-hole return** runs its motor for a fixed feed-forward time per
//!   sunk ball; overlapping requests extend the run.
//! - **Player return** runs its motor until the requested number of balls has
//!   reached the player, failing if the queue sensor stays quiet too long.
//!
//! Requests come from other tasks through [`QueueHandle`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use putt_traits::{Clock, Motor};

use crate::config::QueueCfg;
use crate::error_codes::{ErrorCode, ErrorReporter};
use crate::fsm::{Machine, Step, drive};
use crate::sensors::{SensorBank, SensorId};
use crate::timer::Timer;

/// Externally visible state of either queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QueueState {
    Idle = 0,
    Waiting = 1,
    Dispensing = 2,
    Failed = 3,
}

impl QueueState {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => QueueState::Waiting,
            2 => QueueState::Dispensing,
            3 => QueueState::Failed,
            _ => QueueState::Idle,
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    ball_in_hole_request: AtomicBool,
    ball_in_hole_requests: AtomicU64,
    player_request: AtomicU32,
    ball_in_hole_state: AtomicU8,
    player_state: AtomicU8,
    remaining_player_balls: AtomicU32,
}

/// Cloneable request/telemetry handle for the queue task.
#[derive(Debug, Clone, Default)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl QueueHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for one feed-forward run of the return motor.
    pub fn request_ball_in_hole_return(&self) {
        self.shared.ball_in_hole_request.store(true, Ordering::Release);
        self.shared.ball_in_hole_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Return requests issued since start.
    pub fn ball_in_hole_requests(&self) -> u64 {
        self.shared.ball_in_hole_requests.load(Ordering::Relaxed)
    }

    /// Ask for `balls` more balls; adds to any run already in progress.
    pub fn request_player_balls(&self, balls: u32) {
        if balls == 0 {
            return;
        }
        let _ = self
            .shared
            .player_request
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_add(balls))
            });
    }

    pub fn ball_in_hole_state(&self) -> QueueState {
        QueueState::from_u8(self.shared.ball_in_hole_state.load(Ordering::Acquire))
    }

    pub fn player_state(&self) -> QueueState {
        QueueState::from_u8(self.shared.player_state.load(Ordering::Acquire))
    }

    /// Balls still owed to the player by the current run.
    pub fn remaining_player_balls(&self) -> u32 {
        self.shared.remaining_player_balls.load(Ordering::Acquire)
    }
}

fn start_motor<M: Motor>(motor: &mut M, which: &'static str) {
    if let Err(e) = motor.start() {
        tracing::warn!(motor = which, error = %e, "motor start failed");
    }
}

fn stop_motor<M: Motor>(motor: &mut M, which: &'static str) {
    if let Err(e) = motor.stop() {
        tracing::warn!(motor = which, error = %e, "motor stop failed");
    }
}

#[derive(Debug, Clone, Copy)]
enum ReturnState {
    Idle,
    Waiting,
    Dispensing { timer: Timer, run_ms: u64 },
}

impl ReturnState {
    const fn kind(self) -> QueueState {
        match self {
            ReturnState::Idle => QueueState::Idle,
            ReturnState::Waiting => QueueState::Waiting,
            ReturnState::Dispensing { .. } => QueueState::Dispensing,
        }
    }
}

struct BallInHoleReturn<M> {
    state: ReturnState,
    motor: M,
    feedforward_ms: u64,
    shared: Arc<Shared>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<M: Motor> Machine for BallInHoleReturn<M> {
    type State = ReturnState;
    const NAME: &'static str = "ball_in_hole_return";

    fn state(&self) -> ReturnState {
        self.state
    }

    fn set_state(&mut self, s: ReturnState) {
        self.state = s;
    }

    fn handle(&mut self, s: ReturnState) -> Step<ReturnState> {
        match s {
            ReturnState::Idle => Step::Continue(ReturnState::Waiting),
            ReturnState::Waiting => {
                if !self.shared.ball_in_hole_request.swap(false, Ordering::AcqRel) {
                    return Step::Yield(ReturnState::Waiting);
                }
                start_motor(&mut self.motor, Self::NAME);
                tracing::debug!(run_ms = self.feedforward_ms, "returning sunk ball");
                Step::Yield(ReturnState::Dispensing {
                    timer: Timer::restart(&*self.clock),
                    run_ms: self.feedforward_ms,
                })
            }
            ReturnState::Dispensing { timer, mut run_ms } => {
                let elapsed = timer.elapsed_ms(&*self.clock);
                if self.shared.ball_in_hole_request.swap(false, Ordering::AcqRel) {
                    run_ms = run_ms.max(elapsed.saturating_add(self.feedforward_ms));
                    tracing::debug!(run_ms, "return run extended");
                }
                if elapsed >= run_ms {
                    stop_motor(&mut self.motor, Self::NAME);
                    Step::Yield(ReturnState::Waiting)
                } else {
                    Step::Yield(ReturnState::Dispensing { timer, run_ms })
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PlayerState {
    Idle,
    Waiting,
    Dispensing { timer: Timer, remaining: u32 },
    Failed,
}

impl PlayerState {
    const fn kind(self) -> QueueState {
        match self {
            PlayerState::Idle => QueueState::Idle,
            PlayerState::Waiting => QueueState::Waiting,
            PlayerState::Dispensing { .. } => QueueState::Dispensing,
            PlayerState::Failed => QueueState::Failed,
        }
    }

    const fn remaining(self) -> u32 {
        match self {
            PlayerState::Dispensing { remaining, .. } => remaining,
            _ => 0,
        }
    }
}

struct PlayerReturn<M> {
    state: PlayerState,
    motor: M,
    timeout_ms: u64,
    failures: u64,
    shared: Arc<Shared>,
    sensors: Arc<SensorBank>,
    errors: Arc<dyn ErrorReporter + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<M: Motor> Machine for PlayerReturn<M> {
    type State = PlayerState;
    const NAME: &'static str = "player_return";

    fn state(&self) -> PlayerState {
        self.state
    }

    fn set_state(&mut self, s: PlayerState) {
        self.state = s;
    }

    fn handle(&mut self, s: PlayerState) -> Step<PlayerState> {
        match s {
            PlayerState::Idle => Step::Continue(PlayerState::Waiting),
            PlayerState::Waiting => {
                let requested = self.shared.player_request.swap(0, Ordering::AcqRel);
                if requested == 0 {
                    return Step::Yield(PlayerState::Waiting);
                }
                start_motor(&mut self.motor, Self::NAME);
                tracing::info!(balls = requested, "dispensing to player");
                Step::Yield(PlayerState::Dispensing {
                    timer: Timer::restart(&*self.clock),
                    remaining: requested,
                })
            }
            PlayerState::Dispensing {
                mut timer,
                remaining,
            } => {
                let mut remaining =
                    remaining.saturating_add(self.shared.player_request.swap(0, Ordering::AcqRel));
                if self.sensors.get(SensorId::BallQueue) {
                    self.sensors.clear(SensorId::BallQueue);
                    remaining = remaining.saturating_sub(1);
                    timer = Timer::restart(&*self.clock);
                    tracing::debug!(remaining, "ball reached player");
                }
                if remaining == 0 {
                    stop_motor(&mut self.motor, Self::NAME);
                    Step::Yield(PlayerState::Waiting)
                } else if timer.reached(&*self.clock, self.timeout_ms) {
                    tracing::warn!(remaining, timeout_ms = self.timeout_ms, "no ball reached player");
                    Step::Continue(PlayerState::Failed)
                } else {
                    Step::Yield(PlayerState::Dispensing { timer, remaining })
                }
            }
            PlayerState::Failed => {
                self.errors.set_error(ErrorCode::PlayerBallReturn);
                stop_motor(&mut self.motor, Self::NAME);
                self.failures += 1;
                Step::Yield(PlayerState::Waiting)
            }
        }
    }
}

/// Both return machines; the body of the 100 ms task.
pub struct BallQueue<B: Motor, P: Motor> {
    ball_in_hole: BallInHoleReturn<B>,
    player: PlayerReturn<P>,
    shared: Arc<Shared>,
}

impl<B: Motor, P: Motor> BallQueue<B, P> {
    pub fn new(
        cfg: QueueCfg,
        ball_in_hole_motor: B,
        player_motor: P,
        handle: &QueueHandle,
        sensors: Arc<SensorBank>,
        errors: Arc<dyn ErrorReporter + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let shared = Arc::clone(&handle.shared);
        Self {
            ball_in_hole: BallInHoleReturn {
                state: ReturnState::Idle,
                motor: ball_in_hole_motor,
                feedforward_ms: cfg.ball_in_hole_feedforward_ms,
                shared: Arc::clone(&shared),
                clock: Arc::clone(&clock),
            },
            player: PlayerReturn {
                state: PlayerState::Idle,
                motor: player_motor,
                timeout_ms: cfg.player_return_timeout_ms,
                failures: 0,
                shared: Arc::clone(&shared),
                sensors,
                errors,
                clock,
            },
            shared,
        }
    }

    /// One step of each machine.
    pub fn run(&mut self) {
        drive(&mut self.ball_in_hole);
        drive(&mut self.player);
        self.publish();
    }

    fn publish(&self) {
        self.shared
            .ball_in_hole_state
            .store(self.ball_in_hole.state.kind() as u8, Ordering::Release);
        self.shared
            .player_state
            .store(self.player.state.kind() as u8, Ordering::Release);
        self.shared
            .remaining_player_balls
            .store(self.player.state.remaining(), Ordering::Release);
    }

    pub fn ball_in_hole_state(&self) -> QueueState {
        self.ball_in_hole.state.kind()
    }

    pub fn player_state(&self) -> QueueState {
        self.player.state.kind()
    }

    pub fn remaining_player_balls(&self) -> u32 {
        self.player.state.remaining()
    }

    /// Player runs that ended without delivering every ball.
    pub fn player_failures(&self) -> u64 {
        self.player.failures
    }
}

impl<B: Motor, P: Motor> Drop for BallQueue<B, P> {
    fn drop(&mut self) {
        if matches!(self.ball_in_hole.state, ReturnState::Dispensing { .. }) {
            stop_motor(&mut self.ball_in_hole.motor, "ball_in_hole_return");
        }
        if matches!(self.player.state, PlayerState::Dispensing { .. }) {
            stop_motor(&mut self.player.motor, "player_return");
        }
    }
}
