use chrono::{DateTime, Utc};

use crate::{Result, SpeedwatchError};

/// Optional descriptive data about the speed-test server that served a test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub country: Option<String>,
}

/// Result of one completed speed test.
///
/// Numeric fields are finite and non-negative; [`Measurement::new`] is the
/// only way to build one.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    timestamp: DateTime<Utc>,
    download_mbps: f64,
    upload_mbps: f64,
    ping_ms: f64,
    server: ServerInfo,
}

impl Measurement {
    pub fn new(
        timestamp: DateTime<Utc>,
        download_mbps: f64,
        upload_mbps: f64,
        ping_ms: f64,
    ) -> Result<Self> {
        check_value("download", download_mbps)?;
        check_value("upload", upload_mbps)?;
        check_value("ping", ping_ms)?;
        Ok(Self {
            timestamp,
            download_mbps,
            upload_mbps,
            ping_ms,
            server: ServerInfo::default(),
        })
    }

    pub fn with_server(mut self, server: ServerInfo) -> Self {
        self.server = ServerInfo {
            id: non_empty(server.id),
            name: non_empty(server.name),
            country: non_empty(server.country),
        };
        self
    }

    /// Returns a copy stamped with `timestamp`; used by the monitor to keep
    /// timestamps non-decreasing when the wall clock steps backwards.
    pub fn restamped(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn download_mbps(&self) -> f64 {
        self.download_mbps
    }

    pub fn upload_mbps(&self) -> f64 {
        self.upload_mbps
    }

    pub fn ping_ms(&self) -> f64 {
        self.ping_ms
    }

    pub fn server_id(&self) -> Option<&str> {
        self.server.id.as_deref()
    }

    pub fn server(&self) -> &ServerInfo {
        &self.server
    }

    /// One-line summary for logs.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{:.2} Mbps down, {:.2} Mbps up, {:.2} ms ping",
            self.download_mbps, self.upload_mbps, self.ping_ms
        );
        match (&self.server.id, &self.server.name) {
            (Some(id), Some(name)) => line.push_str(&format!(" (server {id}, {name})")),
            (Some(id), None) => line.push_str(&format!(" (server {id})")),
            (None, Some(name)) => line.push_str(&format!(" ({name})")),
            (None, None) => {}
        }
        line
    }
}

fn check_value(label: &str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(SpeedwatchError::Measurement(format!(
            "{label} value is not a finite number: {value}"
        )));
    }
    if value < 0.0 {
        return Err(SpeedwatchError::Measurement(format!(
            "{label} value must not be negative: {value}"
        )));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
