use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("pwm chip 0x{0:02x} is not initialised")]
    UnknownChip(u8),
    #[error("pwm channel {0} out of range (0..=15)")]
    InvalidChannel(u8),
    #[error("pwm frequency {freq_hz} Hz out of range for a {osc_hz} Hz oscillator")]
    InvalidFrequency { freq_hz: f32, osc_hz: f32 },
    #[error("bus error: {0}")]
    Bus(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
