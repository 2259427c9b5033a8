//! Tracks one ball through the course and keeps the hit/sunk counters.
//!
//! With auto-dispense on, the machine follows a ball from the tee
//! (`ReadyToHit`) through the course (`InTransit`) into a hole or the gutter
//! and then asks for the next ball. With it off, it only counts events
//! (`NoTracking`).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use putt_traits::Clock;

use crate::config::EstimationCfg;
use crate::error_codes::{ErrorCode, ErrorReporter};
use crate::fsm::{Machine, Step, drive};
use crate::queue::QueueHandle;
use crate::sensors::{SensorBank, SensorId};
use crate::timer::Timer;
use crate::types::BallStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationState {
    Idle,
    NoTracking,
    ReadyToHitOnEnter,
    ReadyToHit,
    InTransitOnEnter { since: Timer },
    InTransit { since: Timer },
    InHole,
    InGutter { feed: Timer },
    Stuck,
}

impl EstimationState {
    pub const fn name(self) -> &'static str {
        match self {
            EstimationState::Idle => "idle",
            EstimationState::NoTracking => "no_tracking",
            EstimationState::ReadyToHitOnEnter => "ready_to_hit_on_enter",
            EstimationState::ReadyToHit => "ready_to_hit",
            EstimationState::InTransitOnEnter { .. } => "in_transit_on_enter",
            EstimationState::InTransit { .. } => "in_transit",
            EstimationState::InHole => "in_hole",
            EstimationState::InGutter { .. } => "in_gutter",
            EstimationState::Stuck => "stuck",
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    stats: AtomicU64,
    reset: AtomicBool,
    auto_dispense: AtomicBool,
}

/// Cloneable handle for reading counters and steering the machine.
#[derive(Debug, Clone, Default)]
pub struct EstimationHandle {
    shared: Arc<Shared>,
}

impl EstimationHandle {
    pub fn new(auto_dispense: bool) -> Self {
        let h = Self::default();
        h.set_auto_dispense(auto_dispense);
        h
    }

    /// Start a new game; applied on the next tick.
    pub fn reset_stats(&self) {
        self.shared.reset.store(true, Ordering::Release);
    }

    pub fn stats(&self) -> BallStats {
        BallStats::unpack(self.shared.stats.load(Ordering::Acquire))
    }

    pub fn balls_hit(&self) -> u32 {
        self.stats().balls_hit
    }

    pub fn balls_in_hole(&self) -> u32 {
        self.stats().balls_in_hole
    }

    pub fn set_auto_dispense(&self, on: bool) {
        self.shared.auto_dispense.store(on, Ordering::Release);
    }

    pub fn auto_dispense(&self) -> bool {
        self.shared.auto_dispense.load(Ordering::Acquire)
    }
}

pub struct BallEstimation {
    state: EstimationState,
    stats: BallStats,
    cfg: EstimationCfg,
    shared: Arc<Shared>,
    sensors: Arc<SensorBank>,
    queue: QueueHandle,
    errors: Arc<dyn ErrorReporter + Send + Sync>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl BallEstimation {
    pub fn new(
        cfg: EstimationCfg,
        handle: &EstimationHandle,
        sensors: Arc<SensorBank>,
        queue: QueueHandle,
        errors: Arc<dyn ErrorReporter + Send + Sync>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            state: EstimationState::Idle,
            stats: BallStats::default(),
            cfg,
            shared: Arc::clone(&handle.shared),
            sensors,
            queue,
            errors,
            clock,
        }
    }

    /// One tick.
    pub fn run(&mut self) {
        if self.shared.reset.swap(false, Ordering::AcqRel) {
            tracing::info!(
                balls_hit = self.stats.balls_hit,
                balls_in_hole = self.stats.balls_in_hole,
                "stats reset"
            );
            self.stats = BallStats::default();
        }
        drive(self);
        self.shared.stats.store(self.stats.pack(), Ordering::Release);
    }

    pub fn state(&self) -> EstimationState {
        self.state
    }

    pub fn stats(&self) -> BallStats {
        self.stats
    }

    fn auto_dispense(&self) -> bool {
        self.shared.auto_dispense.load(Ordering::Acquire)
    }

    /// Consume a confirmed event, if any.
    fn take(&self, id: SensorId) -> bool {
        if self.sensors.get(id) {
            self.sensors.clear(id);
            true
        } else {
            false
        }
    }

    fn count_hit(&mut self) {
        self.stats.record_hit();
        tracing::info!(balls_hit = self.stats.balls_hit, "ball hit");
    }

    fn count_in_hole(&mut self) {
        if self.stats.record_in_hole() {
            tracing::info!(balls_in_hole = self.stats.balls_in_hole, "ball in hole");
        } else {
            tracing::warn!(
                balls_hit = self.stats.balls_hit,
                "sunk ball without a hit; count clamped"
            );
            self.errors.set_error(ErrorCode::BallMath);
        }
    }
}

impl Machine for BallEstimation {
    type State = EstimationState;
    const NAME: &'static str = "ball_estimation";

    fn state(&self) -> EstimationState {
        self.state
    }

    fn set_state(&mut self, s: EstimationState) {
        self.state = s;
    }

    fn handle(&mut self, s: EstimationState) -> Step<EstimationState> {
        use EstimationState as E;
        match s {
            E::Idle => {
                if self.auto_dispense() {
                    Step::Continue(E::ReadyToHitOnEnter)
                } else {
                    Step::Continue(E::NoTracking)
                }
            }
            E::NoTracking => {
                if self.auto_dispense() {
                    return Step::Continue(E::ReadyToHitOnEnter);
                }
                if self.take(SensorId::BallDeparture) {
                    self.count_hit();
                }
                if self.take(SensorId::BallInHole) {
                    self.count_in_hole();
                    self.queue.request_ball_in_hole_return();
                }
                Step::Yield(E::NoTracking)
            }
            E::ReadyToHitOnEnter => {
                self.sensors.clear(SensorId::BallDeparture);
                self.sensors.clear(SensorId::BallQueue);
                if !self.auto_dispense() {
                    return Step::Continue(E::NoTracking);
                }
                self.queue.request_player_balls(1);
                Step::Yield(E::ReadyToHit)
            }
            E::ReadyToHit => {
                if self.take(SensorId::BallDeparture) {
                    self.count_hit();
                    Step::Yield(E::InTransitOnEnter {
                        since: Timer::restart(&*self.clock),
                    })
                } else {
                    Step::Yield(E::ReadyToHit)
                }
            }
            E::InTransitOnEnter { since } => {
                self.sensors.clear(SensorId::BallInHole);
                self.sensors.clear(SensorId::BallInGutter);
                Step::Yield(E::InTransit { since })
            }
            E::InTransit { since } => {
                if self.take(SensorId::BallInHole) {
                    self.count_in_hole();
                    Step::Yield(E::InHole)
                } else if self.sensors.get(SensorId::BallInGutter) {
                    // Left confirmed so InGutter sees it on its first tick.
                    Step::Yield(E::InGutter {
                        feed: Timer::restart(&*self.clock),
                    })
                } else if since.reached(&*self.clock, self.cfg.in_transit_timeout_ms) {
                    tracing::warn!(
                        timeout_ms = self.cfg.in_transit_timeout_ms,
                        "ball lost in transit"
                    );
                    Step::Yield(E::Stuck)
                } else {
                    Step::Yield(E::InTransit { since })
                }
            }
            E::InHole => {
                self.queue.request_ball_in_hole_return();
                Step::Yield(E::InGutter {
                    feed: Timer::restart(&*self.clock),
                })
            }
            E::InGutter { feed } => {
                if self.take(SensorId::BallInGutter) {
                    Step::Yield(E::ReadyToHitOnEnter)
                } else if feed.reached(&*self.clock, self.cfg.feed_error_timeout_ms) {
                    tracing::warn!(
                        timeout_ms = self.cfg.feed_error_timeout_ms,
                        "ball never reached the gutter"
                    );
                    self.errors.set_error(ErrorCode::BallInHoleFeed);
                    Step::Yield(E::ReadyToHitOnEnter)
                } else {
                    Step::Yield(E::InGutter { feed })
                }
            }
            E::Stuck => Step::Continue(E::ReadyToHitOnEnter),
        }
    }
}
