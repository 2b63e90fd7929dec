//! Operational helpers: logging setup and process signals.

use speedwatch_types::{Result, SpeedwatchError};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(log_level: &str) -> Result<()> {
    fmt()
        .with_env_filter(log_filter(log_level)?)
        .with_target(true)
        .try_init()
        .map_err(|err| ops_error(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Builds the log filter, falling back to `info` on an unparsable directive.
pub fn log_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| ops_error(format!("failed to create log filter: {err}")))
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("Unable to listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("Unable to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

pub fn ops_error(message: impl Into<String>) -> SpeedwatchError {
    SpeedwatchError::Other(anyhow::Error::msg(message.into()))
}
