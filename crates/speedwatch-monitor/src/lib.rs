//! Periodic monitor driving the measure-then-write cycle.
//!
//! The monitor is either [`MonitorState::Idle`], waiting for the next tick, or
//! [`MonitorState::Running`] one cycle. Cycles never overlap: a tick that falls
//! due while a cycle is still running is delayed rather than queued, and a
//! failed cycle simply waits for the next tick.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use speedwatch_probe::SpeedProbe;
use speedwatch_store::ResultWriter;
use speedwatch_types::{config::Settings, Measurement, Result, SpeedwatchError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub interval: Duration,
    pub server_id: Option<u32>,
    /// Fire the first cycle immediately instead of one interval after start.
    pub run_on_start: bool,
}

impl MonitorConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            interval: settings.interval(),
            server_id: settings.schedule.server_id,
            run_on_start: settings.schedule.run_on_start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Running,
}

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Stored,
    MeasurementFailed(String),
    WriteFailed(String),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Stored)
    }
}

pub struct Monitor<P, W>
where
    P: SpeedProbe,
    W: ResultWriter,
{
    probe: P,
    writer: W,
    config: MonitorConfig,
    state: MonitorState,
    last_timestamp: Option<DateTime<Utc>>,
    cycles: u64,
    consecutive_failures: u32,
}

impl<P, W> Monitor<P, W>
where
    P: SpeedProbe,
    W: ResultWriter,
{
    pub fn new(config: MonitorConfig, probe: P, writer: W) -> Result<Self> {
        if config.interval.is_zero() {
            return Err(monitor_error("test interval must be greater than zero"));
        }
        Ok(Self {
            probe,
            writer,
            config,
            state: MonitorState::Idle,
            last_timestamp: None,
            cycles: 0,
            consecutive_failures: 0,
        })
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Runs cycles on the configured cadence until `shutdown` resolves.
    ///
    /// Shutdown is only observed between cycles, so an in-flight cycle always
    /// finishes first.
    pub async fn run<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let period = self.config.interval;
        let now = Instant::now();
        let first_tick = if self.config.run_on_start {
            now
        } else {
            now.checked_add(period)
                .ok_or_else(|| monitor_error("test interval is too large to schedule"))?
        };
        let mut ticker = interval_at(first_tick, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Starting speed monitor with {} minute intervals",
            period.as_secs() / 60
        );

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Speed monitor stopping after {} cycles", self.cycles);
                    break;
                }
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
            }
        }
        Ok(())
    }

    /// Executes one measure-then-write cycle. Failures are logged and
    /// reported through the outcome, never propagated.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.state = MonitorState::Running;
        let cycle = self.cycles + 1;
        debug!(cycle, "Monitor state: running");
        info!(cycle, "Running scheduled speed test");

        let outcome = match self.probe.run_test(self.config.server_id).await {
            Err(err) => {
                error!(cycle, "Speed test failed: {err}");
                CycleOutcome::MeasurementFailed(err.to_string())
            }
            Ok(measurement) => {
                let measurement = self.enforce_monotonic(measurement);
                let summary = measurement.summary();
                match self.writer.write(measurement).await {
                    Ok(()) => {
                        info!(cycle, "Speed test stored: {summary}");
                        CycleOutcome::Stored
                    }
                    Err(err) => {
                        error!(cycle, "Failed to store speed test ({summary}): {err}");
                        CycleOutcome::WriteFailed(err.to_string())
                    }
                }
            }
        };

        self.cycles = cycle;
        if outcome.is_success() {
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures += 1;
            warn!(
                cycle,
                "{} consecutive failed cycles; next attempt in {}s",
                self.consecutive_failures,
                self.config.interval.as_secs()
            );
        }
        self.state = MonitorState::Idle;
        debug!(cycle, "Monitor state: idle");
        outcome
    }

    fn enforce_monotonic(&mut self, measurement: Measurement) -> Measurement {
        let measurement = match self.last_timestamp {
            Some(last) if measurement.timestamp() <= last => {
                let next = last
                    .checked_add_signed(chrono::Duration::nanoseconds(1))
                    .unwrap_or(last);
                warn!(
                    "Clock did not advance ({} <= {}); stamping result at {}",
                    measurement.timestamp(),
                    last,
                    next
                );
                measurement.restamped(next)
            }
            _ => measurement,
        };
        self.last_timestamp = Some(measurement.timestamp());
        measurement
    }
}

pub fn monitor_error(message: impl Into<String>) -> SpeedwatchError {
    SpeedwatchError::Configuration(message.into())
}
