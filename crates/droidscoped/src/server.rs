//! HTTP server for droidscoped

use crate::config::ServerConfig;
use crate::routes;
use anyhow::{Context, Result};
use axum::Router;
use droidscope_common::{Channel, TelemetryAggregator};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers
pub struct AppState<C: Channel> {
    pub aggregator: Arc<TelemetryAggregator<C>>,
}

impl<C: Channel> AppState<C> {
    pub fn new(aggregator: TelemetryAggregator<C>) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

/// Build the router with tracing, and permissive CORS when enabled.
pub fn app<C: Channel + 'static>(state: AppState<C>, cors: bool) -> Router {
    let router = routes::telemetry_routes()
        .with_state(Arc::new(state))
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Run the HTTP server until ctrl-c
pub async fn run<C: Channel + 'static>(state: AppState<C>, config: &ServerConfig) -> Result<()> {
    let app = app(state, config.cors);

    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("  Listening on http://{}", config.listen);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("  Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully");
}
