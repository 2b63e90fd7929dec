use std::{path::PathBuf, process::Stdio, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use speedwatch_types::{config::ProbeConfig, measurement::ServerInfo, Measurement, Result};
use tokio::{process::Command, time::timeout};
use tracing::{debug, info};

use crate::{probe_error, SpeedProbe};

const BITS_PER_MEGABIT: f64 = 1_000_000.0;
const STDERR_EXCERPT: usize = 400;

/// Runs the external `speedtest-cli` program and reads its JSON report.
pub struct CliProbe {
    binary: PathBuf,
    timeout: Duration,
}

impl CliProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            binary: PathBuf::from(&config.binary),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn args(server_id: Option<u32>) -> Vec<String> {
        let mut args = vec!["--json".to_string()];
        if let Some(id) = server_id {
            args.push("--server".into());
            args.push(id.to_string());
        }
        args
    }

    async fn run_binary(&self, args: &[String]) -> Result<Vec<u8>> {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                probe_error(format!(
                    "speed test timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|err| {
                probe_error(format!(
                    "failed to launch {}: {err}",
                    self.binary.display()
                ))
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(probe_error(format!(
                "{} exited with {}: {}",
                self.binary.display(),
                output.status,
                stderr_excerpt(&output.stderr)
            )))
        }
    }
}

#[async_trait]
impl SpeedProbe for CliProbe {
    async fn run_test(&self, server_id: Option<u32>) -> Result<Measurement> {
        match server_id {
            Some(id) => info!("Starting speed test against server {}", id),
            None => info!("Starting speed test with automatic server selection"),
        }
        let stdout = self.run_binary(&Self::args(server_id)).await?;
        let completed_at = Utc::now();
        let raw = String::from_utf8_lossy(&stdout);
        debug!("speedtest report: {}", raw.trim());
        let measurement = parse_report(&raw, completed_at)?;
        info!("Speed test completed: {}", measurement.summary());
        Ok(measurement)
    }
}

#[derive(Debug, Deserialize)]
struct Report {
    /// Bits per second.
    download: f64,
    /// Bits per second.
    upload: f64,
    ping: f64,
    #[serde(default)]
    server: Option<ReportServer>,
}

#[derive(Debug, Default, Deserialize)]
struct ReportServer {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

/// Converts a `speedtest-cli --json` report into a measurement stamped with
/// `completed_at`. Throughput is reported in bits per second.
pub fn parse_report(raw: &str, completed_at: DateTime<Utc>) -> Result<Measurement> {
    let report: Report = serde_json::from_str(raw.trim())
        .map_err(|err| probe_error(format!("unreadable speedtest report: {err}")))?;

    let server = report.server.unwrap_or_default();
    let id = match server.id {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };

    let measurement = Measurement::new(
        completed_at,
        round2(report.download / BITS_PER_MEGABIT),
        round2(report.upload / BITS_PER_MEGABIT),
        round2(report.ping),
    )?;
    Ok(measurement.with_server(ServerInfo {
        id,
        name: server.name,
        country: server.country,
    }))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn stderr_excerpt(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return "no error output".into();
    }
    let start = text
        .char_indices()
        .rev()
        .nth(STDERR_EXCERPT - 1)
        .map(|(idx, _)| idx)
        .unwrap_or(0);
    text[start..].to_string()
}
