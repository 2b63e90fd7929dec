use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use speedwatch_monitor::{Monitor, MonitorConfig};
use speedwatch_ops::{init_tracing, shutdown_signal};
use speedwatch_probe::{CliProbe, SpeedProbe};
use speedwatch_store::{InfluxWriter, MemoryWriter, ResultWriter};
use speedwatch_types::config::Settings;
use tracing::info;

/// Periodically measures internet speed and stores the results in InfluxDB.
#[derive(Debug, Parser)]
#[command(name = "speedwatch", version)]
struct Cli {
    /// Load environment variables from this file instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Keep results in memory instead of writing to InfluxDB
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env_file(cli.env_file.as_deref())?;

    let settings = Settings::from_env().context("invalid configuration")?;
    init_tracing(&settings.log_level)?;
    info!(
        "Loaded settings: interval={}m server={} bucket={} org={} endpoint={}",
        settings.schedule.interval_minutes,
        settings
            .schedule
            .server_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "auto".into()),
        settings.influx.bucket,
        settings.influx.org,
        settings.influx.endpoint()
    );

    let config = MonitorConfig::from_settings(&settings);
    let probe = CliProbe::new(&settings.probe);

    if cli.dry_run {
        info!("Dry run: results stay in memory");
        run(config, probe, MemoryWriter::new(), cli.once).await
    } else {
        let writer = InfluxWriter::new(&settings.influx)?;
        run(config, probe, writer, cli.once).await
    }
}

async fn run<P, W>(config: MonitorConfig, probe: P, writer: W, once: bool) -> Result<()>
where
    P: SpeedProbe,
    W: ResultWriter,
{
    let mut monitor = Monitor::new(config, probe, writer)?;
    if once {
        let outcome = monitor.run_cycle().await;
        info!("Single cycle finished: {:?}", outcome);
        return Ok(());
    }
    monitor.run(shutdown_signal()).await?;
    info!("Speed monitor stopped");
    Ok(())
}

fn load_env_file(path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from(["speedwatch", "--once", "--dry-run"]).expect("parse");
        assert!(cli.once);
        assert!(cli.dry_run);
        assert!(cli.env_file.is_none());

        let cli = Cli::try_parse_from(["speedwatch", "--env-file", "/etc/speedwatch.env"])
            .expect("parse");
        assert_eq!(cli.env_file, Some(PathBuf::from("/etc/speedwatch.env")));
        assert!(!cli.once);
    }

    #[test]
    fn missing_env_file_is_an_error() {
        assert!(load_env_file(Some(Path::new("/nonexistent/speedwatch.env"))).is_err());
    }
}
