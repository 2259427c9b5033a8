use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use putt_traits::{BoxError, Clock, DigitalInput};

type EdgeCallback = Box<dyn Fn() + Send + Sync>;

struct Line {
    high: AtomicBool,
    falling_edges: AtomicU64,
    on_falling: Mutex<Option<EdgeCallback>>,
}

/// A switch line driven from code. Idles high, like the pulled-up active-low
/// switches on the course.
#[derive(Clone)]
pub struct SimulatedInput {
    line: Arc<Line>,
}

impl fmt::Debug for SimulatedInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedInput")
            .field("high", &self.line.high.load(Ordering::Relaxed))
            .field("falling_edges", &self.falling_edges())
            .finish()
    }
}

impl Default for SimulatedInput {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedInput {
    pub fn new() -> Self {
        Self {
            line: Arc::new(Line {
                high: AtomicBool::new(true),
                falling_edges: AtomicU64::new(0),
                on_falling: Mutex::new(None),
            }),
        }
    }

    /// Register the edge interrupt. Replaces any earlier callback.
    pub fn on_falling_edge(&self, f: impl Fn() + Send + Sync + 'static) {
        let mut slot = self
            .line
            .on_falling
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(Box::new(f));
    }

    pub fn set_level(&self, high: bool) {
        let was_high = self.line.high.swap(high, Ordering::AcqRel);
        if was_high && !high {
            self.line.falling_edges.fetch_add(1, Ordering::Relaxed);
            let slot = self
                .line
                .on_falling
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(cb) = slot.as_ref() {
                cb();
            }
        }
    }

    /// Hold the line low for `hold`, then release it.
    pub fn pulse(&self, clock: &dyn Clock, hold: Duration) {
        self.set_level(false);
        clock.sleep(hold);
        self.set_level(true);
    }

    pub fn falling_edges(&self) -> u64 {
        self.line.falling_edges.load(Ordering::Relaxed)
    }
}

impl DigitalInput for SimulatedInput {
    fn is_high(&self) -> Result<bool, BoxError> {
        Ok(self.line.high.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use putt_traits::ManualClock;

    #[test]
    fn callback_fires_only_on_falling_edge() {
        let input = SimulatedInput::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = Arc::clone(&hits);
        input.on_falling_edge(move || {
            h.fetch_add(1, Ordering::Relaxed);
        });

        input.set_level(true);
        assert_eq!(hits.load(Ordering::Relaxed), 0);
        input.set_level(false);
        input.set_level(false);
        assert_eq!(hits.load(Ordering::Relaxed), 1);
        input.set_level(true);
        input.set_level(false);
        assert_eq!(hits.load(Ordering::Relaxed), 2);
        assert_eq!(input.falling_edges(), 2);
    }

    #[test]
    fn pulse_holds_low_for_the_given_time() {
        let clock = ManualClock::new();
        let input = SimulatedInput::new();
        let t0 = clock.now();
        input.pulse(&clock, Duration::from_millis(25));
        assert_eq!(clock.ms_since(t0), 25);
        assert!(input.is_high().unwrap());
        assert_eq!(input.falling_edges(), 1);
    }
}
