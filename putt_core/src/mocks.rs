//! Test and helper mocks for putt_core.
//!
//! Every mock keeps its observable state behind an `Arc`, so a clone kept by
//! the test still sees what the system did after the original was moved in.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use putt_traits::{ActuatorDriver, BoxError, ChipConfig, CourseStore, DigitalInput, Motor};

/// One accepted `set_position` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionWrite {
    pub chip_address: u8,
    pub channel: u8,
    pub position: u8,
}

#[derive(Debug, Default)]
struct DriverLog {
    chips: Vec<ChipConfig>,
    writes: Vec<PositionWrite>,
    fail_writes: bool,
}

/// Driver that records every call.
#[derive(Debug, Clone, Default)]
pub struct RecordingDriver {
    log: Arc<Mutex<DriverLog>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_log<R>(&self, f: impl FnOnce(&mut DriverLog) -> R) -> R {
        let mut g = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    pub fn initialized_chips(&self) -> Vec<u8> {
        self.with_log(|l| l.chips.iter().map(|c| c.address).collect())
    }

    pub fn writes(&self) -> Vec<PositionWrite> {
        self.with_log(|l| l.writes.clone())
    }

    pub fn clear_writes(&self) {
        self.with_log(|l| l.writes.clear());
    }

    /// Make every subsequent `set_position` fail.
    pub fn fail_writes(&self, fail: bool) {
        self.with_log(|l| l.fail_writes = fail);
    }
}

impl ActuatorDriver for RecordingDriver {
    fn init(&mut self, chip: ChipConfig) -> Result<(), BoxError> {
        self.with_log(|l| l.chips.push(chip));
        Ok(())
    }

    fn set_position(&mut self, chip_address: u8, channel: u8, position: u8) -> Result<(), BoxError> {
        self.with_log(|l| {
            if l.fail_writes {
                return Err(Box::new(std::io::Error::other("bus nack")) as BoxError);
            }
            l.writes.push(PositionWrite {
                chip_address,
                channel,
                position,
            });
            Ok(())
        })
    }
}

#[derive(Debug, Default)]
struct StoreState {
    blob: Option<Vec<u8>>,
    writes: u32,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-memory course store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `blob`.
    pub fn with_blob(blob: &[u8]) -> Self {
        let s = Self::default();
        s.with_state(|st| st.blob = Some(blob.to_vec()));
        s
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let mut g = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut g)
    }

    pub fn blob(&self) -> Option<Vec<u8>> {
        self.with_state(|s| s.blob.clone())
    }

    pub fn writes(&self) -> u32 {
        self.with_state(|s| s.writes)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.with_state(|s| s.fail_reads = fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.with_state(|s| s.fail_writes = fail);
    }
}

impl CourseStore for MemoryStore {
    fn write_course_state(&mut self, state: &[u8]) -> Result<(), BoxError> {
        self.with_state(|s| {
            if s.fail_writes {
                return Err(Box::new(std::io::Error::other("flash write failed")) as BoxError);
            }
            s.blob = Some(state.to_vec());
            s.writes += 1;
            Ok(())
        })
    }

    fn read_course_state(&mut self) -> Result<Vec<u8>, BoxError> {
        self.with_state(|s| {
            if s.fail_reads {
                return Err(Box::new(std::io::Error::other("flash read failed")) as BoxError);
            }
            Ok(s.blob.clone().unwrap_or_default())
        })
    }
}

#[derive(Debug, Default)]
struct MotorState {
    running: AtomicBool,
    starts: AtomicU32,
    stops: AtomicU32,
}

/// Motor that counts start/stop calls.
#[derive(Debug, Clone, Default)]
pub struct SpyMotor {
    state: Arc<MotorState>,
}

impl SpyMotor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn running(&self) -> bool {
        self.state.running.load(Ordering::Relaxed)
    }

    pub fn starts(&self) -> u32 {
        self.state.starts.load(Ordering::Relaxed)
    }

    pub fn stops(&self) -> u32 {
        self.state.stops.load(Ordering::Relaxed)
    }
}

impl Motor for SpyMotor {
    fn start(&mut self) -> Result<(), BoxError> {
        self.state.running.store(true, Ordering::Relaxed);
        self.state.starts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BoxError> {
        self.state.running.store(false, Ordering::Relaxed);
        self.state.stops.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Input line whose level the test sets. Idles high (switch open).
#[derive(Debug, Clone)]
pub struct ScriptedInput {
    level: Arc<AtomicBool>,
}

impl Default for ScriptedInput {
    fn default() -> Self {
        Self {
            level: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl ScriptedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_high(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }
}

impl DigitalInput for ScriptedInput {
    fn is_high(&self) -> Result<bool, BoxError> {
        Ok(self.level.load(Ordering::Relaxed))
    }
}
