//! Fixed-period task threads.
//!
//! Each `PeriodicTask` owns one thread that calls its tick closure against an
//! absolute deadline (`next += period`), so the period does not drift with
//! tick duration. A tick that overruns its deadline re-bases the schedule to
//! "now" instead of bursting to catch up.
//!
//! The thread waits on a stop channel with `recv_deadline`, so shutdown is
//! immediate; dropping the task stops and joins the thread.
use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    overruns: AtomicU64,
}

pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    stop_tx: Option<xch::Sender<()>>,
    counters: Arc<Counters>,
    join_handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn a thread named `name` that runs `tick` once per `period`,
    /// starting immediately.
    pub fn spawn<F>(name: &'static str, period: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let period = period.max(Duration::from_micros(1));
        let (stop_tx, stop_rx) = xch::bounded::<()>(1);
        let counters = Arc::new(Counters::default());
        let counters_clone = Arc::clone(&counters);

        let join_handle = std::thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                let mut next = Instant::now();
                loop {
                    tick();
                    counters_clone.ticks.fetch_add(1, Ordering::Relaxed);

                    next += period;
                    let now = Instant::now();
                    if now > next {
                        counters_clone.overruns.fetch_add(1, Ordering::Relaxed);
                        tracing::trace!(task = name, late_us = ?(now - next).as_micros(), "overrun");
                        next = now;
                    }
                    match stop_rx.recv_deadline(next) {
                        Err(xch::RecvTimeoutError::Timeout) => {}
                        // Stop signal or all senders gone.
                        Ok(()) | Err(xch::RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::trace!(task = name, "task thread exiting cleanly");
            })?;

        tracing::debug!(task = name, period_us = ?period.as_micros(), "task started");
        Ok(Self {
            name,
            period,
            stop_tx: Some(stop_tx),
            counters,
            join_handle: Some(join_handle),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.counters.ticks.load(Ordering::Relaxed)
    }

    /// Ticks that finished after the next deadline had already passed.
    pub fn overruns(&self) -> u64 {
        self.counters.overruns.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for the tick in progress to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!(task = self.name, "task joined"),
                Err(e) => tracing::warn!(task = self.name, ?e, "task panicked during shutdown"),
            }
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn ticks_until_stopped() {
        let count = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&count);
        let task = PeriodicTask::spawn("test-tick", Duration::from_millis(1), move || {
            c.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let ticks = task.ticks();
        task.stop();
        let after = count.load(Ordering::Relaxed);
        assert!(after >= 2, "expected several ticks, got {after}");
        assert!(u64::from(after) >= ticks);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(count.load(Ordering::Relaxed), after, "ticked after stop");
    }

    #[test]
    fn slow_tick_counts_overruns() {
        let task = PeriodicTask::spawn("test-slow", Duration::from_millis(1), || {
            std::thread::sleep(Duration::from_millis(3));
        })
        .unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert!(task.overruns() >= 1);
        drop(task);
    }
}
