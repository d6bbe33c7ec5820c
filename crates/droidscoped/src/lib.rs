//! droidscoped - HTTP daemon serving Android device telemetry.

pub mod config;
pub mod routes;
pub mod server;

use tracing_subscriber::EnvFilter;

/// Initialize logging: `RUST_LOG` when set, else the configured level.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
