use thiserror::Error;

use crate::sensors::SensorId;

#[derive(Debug, Error, Clone)]
pub enum CourseError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid payload: {0}")]
    Payload(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing actuator driver")]
    MissingDriver,
    #[error("missing course store")]
    MissingStore,
    #[error("missing {0} motor")]
    MissingMotor(&'static str),
    #[error("missing {} input", .0.name())]
    MissingInput(SensorId),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
