use thiserror::Error;

pub type Result<T, E = SpeedwatchError> = std::result::Result<T, E>;

/// Unified error type covering the failure classes of a monitoring cycle.
///
/// Only [`SpeedwatchError::Configuration`] is fatal; the other variants are
/// logged by the monitor and the loop waits for the next tick.
#[derive(Debug, Error)]
pub enum SpeedwatchError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("measurement error: {0}")]
    Measurement(String),
    #[error("write error: {0}")]
    Write(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SpeedwatchError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, SpeedwatchError::Configuration(_))
    }
}

pub fn config_error(message: impl Into<String>) -> SpeedwatchError {
    SpeedwatchError::Configuration(message.into())
}
