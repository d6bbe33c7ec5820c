//! droidscope daemon
//!
//! Serves telemetry from the adb-attached Android device over HTTP.

use anyhow::{Context, Result};
use droidscope_common::{ShellChannel, TelemetryAggregator};
use droidscoped::config::{config_path, DaemonConfig};
use droidscoped::server::{self, AppState};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = DaemonConfig::load().context("Failed to load configuration")?;
    droidscoped::init_logging(&config.logging.level);

    info!("droidscoped v{} starting", droidscope_common::VERSION);
    info!("  Config: {}", config_path().display());
    info!(
        "  adb: {} (device: {})",
        config.adb.path,
        config.adb.serial.as_deref().unwrap_or("default")
    );

    let channel = ShellChannel::adb(config.adb.path.clone(), config.adb.serial.as_deref());
    let state = AppState::new(TelemetryAggregator::new(channel, config.cache));

    let aggregator = Arc::clone(&state.aggregator);
    let health = tokio::task::spawn_blocking(move || aggregator.health())
        .await
        .context("Initial health check failed")?;
    if health.adb_connected {
        info!("  Device attached");
    } else {
        warn!("  No device attached yet; endpoints will fail until one is");
    }

    server::run(state, &config.server).await
}
