//! auto-kingdom daemon: runs every enabled instance on its schedule.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ak_core::config::Config;
use ak_daemon::daemon::{Daemon, DEFAULT_POLL_SECS};
use ak_telemetry::logging::{init_logging, LoggingConfig};
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "ak-daemon", version, about = "Scheduled auto-kingdom runner")]
struct Args {
    /// Config file (defaults to ~/.auto-kingdom/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds between schedule checks.
    #[arg(long, default_value_t = DEFAULT_POLL_SECS)]
    poll_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path).with_context(|| format!("failed to load {}", path.display()))?,
        None => Config::load().context("failed to load config")?,
    };

    init_logging(
        "ak-daemon",
        &LoggingConfig::from_settings(&config.general.log_level, &config.general.log_format),
    );
    info!(instances = config.instances.len(), "auto-kingdom daemon starting");

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir).with_context(|| format!("failed to create {}", data_dir.display()))?;

    let mut daemon = Daemon::new(Arc::new(config));
    daemon.set_poll_interval(Duration::from_secs(args.poll_secs.max(1)));
    let daemon = Arc::new(daemon);

    // Wire ctrl-c to a cooperative stop of every instance.
    let handle = daemon.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        handle.shutdown();
    });

    daemon.run().await
}
