//! Speed-test measurement clients.

mod cli;

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use async_trait::async_trait;
use chrono::Utc;
use speedwatch_types::{measurement::ServerInfo, Measurement, Result, SpeedwatchError};
use tracing::info;

pub use cli::{parse_report, CliProbe};

#[async_trait]
pub trait SpeedProbe: Send + Sync {
    /// Runs one full speed test. With `server_id` the test targets that
    /// server, otherwise the tool picks the best one itself.
    async fn run_test(&self, server_id: Option<u32>) -> Result<Measurement>;
}

#[derive(Debug, Clone)]
enum FixedResponse {
    Measure {
        download_mbps: f64,
        upload_mbps: f64,
        ping_ms: f64,
        server: ServerInfo,
    },
    Fail(String),
}

/// Probe that never touches the network and answers with preset values.
#[derive(Debug, Clone)]
pub struct FixedProbe {
    response: FixedResponse,
    calls: Arc<AtomicU64>,
}

impl FixedProbe {
    pub fn new(download_mbps: f64, upload_mbps: f64, ping_ms: f64) -> Self {
        Self {
            response: FixedResponse::Measure {
                download_mbps,
                upload_mbps,
                ping_ms,
                server: ServerInfo::default(),
            },
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            response: FixedResponse::Fail(message.into()),
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_server(mut self, server: ServerInfo) -> Self {
        if let FixedResponse::Measure { server: slot, .. } = &mut self.response {
            *slot = server;
        }
        self
    }

    /// Number of tests run so far, shared between clones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeedProbe for FixedProbe {
    async fn run_test(&self, server_id: Option<u32>) -> Result<Measurement> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            FixedResponse::Measure {
                download_mbps,
                upload_mbps,
                ping_ms,
                server,
            } => {
                info!("Fixed probe answering (pinned server: {:?})", server_id);
                Ok(
                    Measurement::new(Utc::now(), *download_mbps, *upload_mbps, *ping_ms)?
                        .with_server(server.clone()),
                )
            }
            FixedResponse::Fail(message) => Err(probe_error(message.clone())),
        }
    }
}

pub fn probe_error(message: impl Into<String>) -> SpeedwatchError {
    SpeedwatchError::Measurement(message.into())
}
