use std::{fmt, time::Duration};

use async_trait::async_trait;
use reqwest::{header, StatusCode};
use speedwatch_types::{
    config::InfluxConfig, config_error, Measurement, Result, Secret, SpeedwatchError,
};
use tracing::{debug, info};

use crate::{line_protocol::encode_point, write_error, ResultWriter};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const BODY_EXCERPT: usize = 200;

/// Writes measurements through the InfluxDB 2.x HTTP write API.
pub struct InfluxWriter {
    client: reqwest::Client,
    write_url: String,
    org: String,
    bucket: String,
    token: Secret,
}

impl InfluxWriter {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(client_error)?;

        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
        })
    }
}

#[async_trait]
impl ResultWriter for InfluxWriter {
    async fn write(&self, measurement: Measurement) -> Result<()> {
        let point = encode_point(&measurement)?;
        debug!("Writing point to bucket {}: {}", self.bucket, point);

        let response = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(
                header::AUTHORIZATION,
                format!("Token {}", self.token.expose()),
            )
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(point)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            info!(
                "Wrote speed test result to InfluxDB: {}",
                measurement.timestamp()
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// The client is built once at startup, so failing here stops the process.
fn client_error(err: impl fmt::Display) -> SpeedwatchError {
    config_error(format!("failed to build HTTP client: {err}"))
}

fn transport_error(err: reqwest::Error) -> SpeedwatchError {
    let err = err.without_url();
    if err.is_timeout() {
        write_error(format!("InfluxDB request timed out: {err}"))
    } else if err.is_connect() {
        write_error(format!("connection to InfluxDB failed: {err}"))
    } else {
        write_error(format!("InfluxDB request failed: {err}"))
    }
}

fn status_error(status: StatusCode, body: &str) -> SpeedwatchError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return write_error(format!("InfluxDB authentication rejected (HTTP {status})"));
    }
    let excerpt: String = body.trim().chars().take(BODY_EXCERPT).collect();
    if excerpt.is_empty() {
        write_error(format!("InfluxDB rejected write (HTTP {status})"))
    } else {
        write_error(format!("InfluxDB rejected write (HTTP {status}): {excerpt}"))
    }
}
