//! Result writers: where finished measurements end up.

mod influx;
pub mod line_protocol;

use std::sync::Arc;

use async_trait::async_trait;
use speedwatch_types::{Measurement, Result, SpeedwatchError};
use tokio::sync::Mutex;
use tracing::info;

pub use influx::InfluxWriter;

#[async_trait]
pub trait ResultWriter: Send + Sync {
    /// Persists one measurement. A failed write is not retried.
    async fn write(&self, measurement: Measurement) -> Result<()>;
}

/// In-memory writer for dry runs and tests.
#[derive(Clone, Default)]
pub struct MemoryWriter {
    written: Arc<Mutex<Vec<Measurement>>>,
    attempts: Arc<Mutex<u64>>,
    failure: Option<String>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer that rejects every measurement with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    pub async fn written(&self) -> Vec<Measurement> {
        self.written.lock().await.clone()
    }

    /// Every call to `write`, successful or not.
    pub async fn attempts(&self) -> u64 {
        *self.attempts.lock().await
    }
}

#[async_trait]
impl ResultWriter for MemoryWriter {
    async fn write(&self, measurement: Measurement) -> Result<()> {
        *self.attempts.lock().await += 1;
        if let Some(message) = &self.failure {
            return Err(write_error(message.clone()));
        }
        info!("Recorded measurement in memory: {}", measurement.summary());
        self.written.lock().await.push(measurement);
        Ok(())
    }
}

pub fn write_error(message: impl Into<String>) -> SpeedwatchError {
    SpeedwatchError::Write(message.into())
}
