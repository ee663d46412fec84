use std::sync::Arc;

use ak_core::config::Config;
use ak_daemon::session::{InstanceSession, RunOptions, SessionOutcome};
use ak_harness::CancelToken;
use ak_telemetry::{init_logging, LoggingConfig};
use anyhow::Context;
use tracing::info;

use super::find_instance;

/// Run one session for `instance_id` in the foreground and print its
/// `CycleResult` as JSON. Returns `false` when any entity failed.
pub async fn run(
    config: Config,
    instance_id: &str,
    force: bool,
    start_from: Option<u32>,
    entities: Option<u32>,
) -> anyhow::Result<bool> {
    init_logging(
        "ak",
        &LoggingConfig::from_settings(&config.general.log_level, &config.general.log_format),
    );

    let instance = find_instance(&config, instance_id)?.clone();
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir).with_context(|| format!("failed to create {}", data_dir.display()))?;

    let options = RunOptions {
        force_daily_tasks: force,
        start_index: start_from,
        entity_count: entities,
    };
    let cancel = CancelToken::new();
    let session = InstanceSession::new(Arc::new(config), instance, options, cancel.clone());

    let stopper = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, finishing the current step");
            stopper.request_stop();
        }
    });

    let report = tokio::task::spawn_blocking(move || session.run())
        .await
        .context("session thread panicked")?;

    println!("{}", serde_json::to_string_pretty(&report.cycle)?);

    if let SessionOutcome::Failed(reason) = &report.outcome {
        anyhow::bail!("session for '{instance_id}' failed: {reason}");
    }
    Ok(report.cycle.failed_entities.is_empty())
}
