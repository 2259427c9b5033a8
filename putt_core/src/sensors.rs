//! Edge-armed, poll-confirmed switch debouncing.
//!
//! An edge callback (interrupt context on real hardware) only *arms* a sensor
//! by stamping the edge time. The sensor task later samples the line: if the
//! level still matches the active level once the window has passed the event
//! is confirmed; a mismatch in between counts as a glitch and disarms.
//!
//! Both sides touch only atomics, so arming never blocks.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use putt_traits::{Clock, DigitalInput};

use crate::config::{SensorCfg, SensorsCfg};

/// The four ball switches on the course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorId {
    /// A ball dropped into any hole.
    BallInHole,
    /// A ball reached the gutter behind the holes.
    BallInGutter,
    /// A ball left the tee.
    BallDeparture,
    /// A ball arrived in the player's queue.
    BallQueue,
}

impl SensorId {
    pub const ALL: [SensorId; 4] = [
        SensorId::BallInHole,
        SensorId::BallInGutter,
        SensorId::BallDeparture,
        SensorId::BallQueue,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            SensorId::BallInHole => "ball_in_hole",
            SensorId::BallInGutter => "ball_in_gutter",
            SensorId::BallDeparture => "ball_departure",
            SensorId::BallQueue => "ball_queue",
        }
    }
}

/// Debounce state of one switch.
///
/// Everything lives in one word: the top bit is "confirmed", the rest holds
/// `edge_us + 1` (zero means idle). Every transition is a single atomic
/// operation on that word, so an edge, a poll and a clear can interleave in
/// any order without losing or resurrecting an event.
#[derive(Debug)]
pub struct DebouncedSensor {
    word: AtomicU64,
    active_high: bool,
    window_us: u64,
}

const CONFIRMED: u64 = 1 << 63;
const EDGE_MASK: u64 = CONFIRMED - 1;

impl DebouncedSensor {
    pub fn new(cfg: SensorCfg) -> Self {
        Self {
            word: AtomicU64::new(0),
            active_high: !cfg.active_low,
            window_us: cfg.debounce_ms.saturating_mul(1_000),
        }
    }

    /// Record an edge at `at_us`. A later edge re-captures the timestamp;
    /// edges are ignored while a confirmed event waits to be consumed.
    pub fn arm(&self, at_us: u64) {
        let stamp = at_us.saturating_add(1).min(EDGE_MASK);
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                (w & CONFIRMED == 0).then_some(stamp)
            });
    }

    /// Whether the poller has work to do.
    pub fn pending(&self) -> bool {
        let w = self.word.load(Ordering::Acquire);
        w != 0 && w & CONFIRMED == 0
    }

    /// Check a sampled level. Returns `true` when this call confirmed the event.
    pub fn poll(&self, level_high: bool, now_us: u64) -> bool {
        let snap = self.word.load(Ordering::Acquire);
        if snap == 0 || snap & CONFIRMED != 0 {
            return false;
        }
        if level_high != self.active_high {
            // Glitch; keep a newer edge if one raced in.
            let _ = self
                .word
                .compare_exchange(snap, 0, Ordering::AcqRel, Ordering::Relaxed);
            return false;
        }
        let edge_us = snap - 1;
        if now_us.saturating_sub(edge_us) < self.window_us {
            return false;
        }
        // Fails if the event was cleared or re-armed since the load.
        self.word
            .compare_exchange(snap, snap | CONFIRMED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    /// The event was confirmed and not yet consumed.
    pub fn get(&self) -> bool {
        self.word.load(Ordering::Acquire) & CONFIRMED != 0
    }

    /// Consume the event and re-enable detection.
    pub fn clear(&self) {
        self.word.store(0, Ordering::Release);
    }

    /// Level that means "ball present".
    pub fn active_level(&self) -> bool {
        self.active_high
    }
}

/// The four debounced sensors plus the time base their edges are stamped in.
pub struct SensorBank {
    sensors: [DebouncedSensor; 4],
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl std::fmt::Debug for SensorBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorBank")
            .field("sensors", &self.sensors)
            .finish_non_exhaustive()
    }
}

impl SensorBank {
    pub fn new(cfg: &SensorsCfg, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self {
            sensors: [
                DebouncedSensor::new(cfg.ball_in_hole),
                DebouncedSensor::new(cfg.ball_in_gutter),
                DebouncedSensor::new(cfg.ball_departure),
                DebouncedSensor::new(cfg.ball_queue),
            ],
            clock,
            epoch,
        }
    }

    pub fn sensor(&self, id: SensorId) -> &DebouncedSensor {
        &self.sensors[id.index()]
    }

    /// Microseconds since the bank was created.
    pub fn now_us(&self) -> u64 {
        self.clock.us_since(self.epoch)
    }

    /// Edge callback entry point.
    pub fn arm(&self, id: SensorId) {
        self.sensor(id).arm(self.now_us());
    }

    pub fn poll(&self, id: SensorId, level_high: bool) -> bool {
        self.sensor(id).poll(level_high, self.now_us())
    }

    pub fn get(&self, id: SensorId) -> bool {
        self.sensor(id).get()
    }

    pub fn clear(&self, id: SensorId) {
        self.sensor(id).clear();
    }
}

/// Samples the raw lines of armed sensors; the body of the 1 ms task.
pub struct SensorPoller {
    bank: Arc<SensorBank>,
    inputs: Vec<(SensorId, Box<dyn DigitalInput + Send>)>,
    glitches: u64,
}

impl SensorPoller {
    pub fn new(bank: Arc<SensorBank>, inputs: Vec<(SensorId, Box<dyn DigitalInput + Send>)>) -> Self {
        Self {
            bank,
            inputs,
            glitches: 0,
        }
    }

    pub fn run(&mut self) {
        for (id, input) in &self.inputs {
            let sensor = self.bank.sensor(*id);
            if !sensor.pending() {
                continue;
            }
            let level = match input.is_high() {
                Ok(level) => level,
                Err(e) => {
                    tracing::warn!(sensor = id.name(), error = %e, "input read failed");
                    !sensor.active_level()
                }
            };
            if level != sensor.active_level() {
                self.glitches += 1;
                tracing::trace!(sensor = id.name(), "glitch");
            }
            if self.bank.poll(*id, level) {
                tracing::debug!(sensor = id.name(), "confirmed");
            }
        }
    }

    /// Edges that were rejected as glitches.
    pub fn glitches(&self) -> u64 {
        self.glitches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(ms: u64) -> DebouncedSensor {
        DebouncedSensor::new(SensorCfg::new(ms))
    }

    #[test]
    fn confirms_after_window_at_active_level() {
        let s = sensor(10);
        s.arm(1_000);
        assert!(!s.poll(false, 5_000));
        assert!(s.poll(false, 11_000));
        assert!(s.get());
        // Already confirmed; further polls are no-ops.
        assert!(!s.poll(true, 20_000));
        assert!(s.get());
    }

    #[test]
    fn inactive_level_disarms() {
        let s = sensor(10);
        s.arm(0);
        assert!(!s.poll(true, 2_000));
        assert!(!s.pending());
        assert!(!s.poll(false, 20_000));
        assert!(!s.get());
    }

    #[test]
    fn rearm_recaptures_timestamp() {
        let s = sensor(10);
        s.arm(0);
        s.arm(8_000);
        assert!(!s.poll(false, 12_000));
        assert!(s.poll(false, 18_000));
    }

    #[test]
    fn edge_at_time_zero_is_still_armed() {
        let s = sensor(0);
        s.arm(0);
        assert!(s.pending());
        assert!(s.poll(false, 0));
    }

    #[test]
    fn clear_reenables_detection() {
        let s = sensor(1);
        s.arm(0);
        assert!(s.poll(false, 1_000));
        s.clear();
        assert!(!s.get());
        assert!(!s.pending());
        s.arm(5_000);
        assert!(s.poll(false, 6_000));
    }

    #[test]
    fn edges_are_ignored_until_confirmed_event_is_consumed() {
        let s = sensor(1);
        s.arm(0);
        assert!(s.poll(false, 1_000));
        s.arm(50_000);
        assert!(s.get());
        assert!(!s.pending());
        s.clear();
        // The ignored edge does not linger after the clear.
        assert!(!s.pending());
        assert!(!s.poll(false, 100_000));
    }

    #[test]
    fn clear_racing_the_poller_never_resurrects_the_event() {
        let s = sensor(0);
        for _ in 0..2_000 {
            s.arm(0);
            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..50 {
                        s.poll(false, 1_000);
                    }
                });
                s.clear();
            });
            assert!(!s.get());
            assert!(!s.pending());
        }
    }

    #[test]
    fn active_high_sensor_inverts_levels() {
        let s = DebouncedSensor::new(SensorCfg {
            debounce_ms: 1,
            active_low: false,
        });
        s.arm(0);
        assert!(s.poll(true, 1_000));
    }
}
