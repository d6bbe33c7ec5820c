//! API routes for droidscoped
//!
//! One GET endpoint per telemetry domain plus `/system` and `/health`.
//! Aggregator calls block on adb, so each runs on the blocking pool.

use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use droidscope_common::{
    BatteryInfo, Channel, CoreTemperatures, CpuFrequency, CpuGovernors, CpuIdle, CpuInfo,
    DeviceInfo, DisplayInfo, HealthStatus, MemoryInfo, MountInfo, NetworkInfo, OsInfo, PowerInfo,
    StorageInfo, SystemSnapshot, TelemetryAggregator, TelemetryError, ThermalInfo, UptimeInfo,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, warn};

type AppStateArc<C> = Arc<AppState<C>>;
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Endpoint table served by `GET /`.
pub const ENDPOINTS: [(&str, &str); 18] = [
    ("health", "/health"),
    ("device", "/device"),
    ("os", "/os"),
    ("cpu", "/cpu"),
    ("cpu_frequency", "/cpu/frequency"),
    ("cpu_governors", "/cpu/governors"),
    ("cpu_idle", "/cpu/idle"),
    ("memory", "/memory"),
    ("storage", "/storage"),
    ("mounts", "/storage/mounts"),
    ("battery", "/battery"),
    ("power", "/power"),
    ("thermal", "/thermal"),
    ("core_temperatures", "/thermal/cores"),
    ("network", "/network"),
    ("display", "/display"),
    ("uptime", "/uptime"),
    ("system", "/system"),
];

// ============================================================================
// Errors
// ============================================================================

/// JSON error body: `{"detail": <message>, "error": <kind>}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    kind: &'static str,
}

impl ApiError {
    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
            kind: "internal",
        }
    }
}

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        let status = if err.is_channel() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            detail: err.to_string(),
            kind: err.kind(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "detail": self.detail, "error": self.kind }));
        (self.status, body).into_response()
    }
}

/// Run an aggregator call on the blocking pool.
async fn fetch<C, T, F>(state: &AppStateArc<C>, domain: &'static str, build: F) -> ApiResult<T>
where
    C: Channel + 'static,
    T: Send + 'static,
    F: FnOnce(&TelemetryAggregator<C>) -> droidscope_common::Result<T> + Send + 'static,
{
    let aggregator = Arc::clone(&state.aggregator);
    let result = tokio::task::spawn_blocking(move || build(&aggregator))
        .await
        .map_err(|e| {
            error!("  {} worker panicked: {}", domain, e);
            ApiError::internal(format!("{} worker failed", domain))
        })?;

    result.map(Json).map_err(|e| {
        warn!("  {} request failed: {}", domain, e);
        ApiError::from(e)
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn telemetry_routes<C: Channel + 'static>() -> Router<AppStateArc<C>> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health::<C>))
        .route("/device", get(device::<C>))
        .route("/os", get(os::<C>))
        .route("/cpu", get(cpu::<C>))
        .route("/cpu/frequency", get(cpu_frequency::<C>))
        .route("/cpu/governors", get(cpu_governors::<C>))
        .route("/cpu/idle", get(cpu_idle::<C>))
        .route("/memory", get(memory::<C>))
        .route("/storage", get(storage::<C>))
        .route("/storage/mounts", get(mounts::<C>))
        .route("/battery", get(battery::<C>))
        .route("/power", get(power::<C>))
        .route("/thermal", get(thermal::<C>))
        .route("/thermal/cores", get(core_temperatures::<C>))
        .route("/network", get(network::<C>))
        .route("/display", get(display::<C>))
        .route("/uptime", get(uptime::<C>))
        .route("/system", get(system::<C>))
}

async fn root() -> Json<Value> {
    let endpoints: serde_json::Map<String, Value> = ENDPOINTS
        .iter()
        .map(|(name, path)| (name.to_string(), Value::from(*path)))
        .collect();

    Json(json!({
        "app": "droidscope",
        "version": droidscope_common::VERSION,
        "endpoints": endpoints,
        "timestamp": Utc::now(),
    }))
}

async fn health<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<HealthStatus> {
    let aggregator = Arc::clone(&state.aggregator);
    let status = tokio::task::spawn_blocking(move || aggregator.health())
        .await
        .map_err(|e| {
            error!("  health worker panicked: {}", e);
            ApiError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                detail: "health check failed".to_string(),
                kind: "internal",
            }
        })?;
    Ok(Json(status))
}

// ============================================================================
// Domain routes
// ============================================================================

async fn device<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<DeviceInfo> {
    fetch(&state, "device", |agg| agg.device()).await
}

async fn os<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<OsInfo> {
    fetch(&state, "os", |agg| agg.os()).await
}

async fn cpu<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<CpuInfo> {
    fetch(&state, "cpu", |agg| agg.cpu()).await
}

async fn cpu_frequency<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<CpuFrequency> {
    fetch(&state, "cpu_frequency", |agg| agg.cpu_frequency()).await
}

async fn cpu_governors<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<CpuGovernors> {
    fetch(&state, "cpu_governors", |agg| agg.cpu_governors()).await
}

async fn cpu_idle<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<CpuIdle> {
    fetch(&state, "cpu_idle", |agg| agg.cpu_idle()).await
}

async fn memory<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<MemoryInfo> {
    fetch(&state, "memory", |agg| agg.memory()).await
}

async fn storage<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<StorageInfo> {
    fetch(&state, "storage", |agg| agg.storage()).await
}

async fn mounts<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<Vec<MountInfo>> {
    fetch(&state, "mounts", |agg| agg.mounts()).await
}

async fn battery<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<BatteryInfo> {
    fetch(&state, "battery", |agg| agg.battery()).await
}

async fn power<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<PowerInfo> {
    fetch(&state, "power", |agg| agg.power()).await
}

async fn thermal<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<ThermalInfo> {
    fetch(&state, "thermal", |agg| agg.thermal()).await
}

async fn core_temperatures<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<CoreTemperatures> {
    fetch(&state, "core_temperatures", |agg| agg.core_temperatures()).await
}

async fn network<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<NetworkInfo> {
    fetch(&state, "network", |agg| agg.network()).await
}

async fn display<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<DisplayInfo> {
    fetch(&state, "display", |agg| agg.display()).await
}

async fn uptime<C: Channel + 'static>(State(state): State<AppStateArc<C>>) -> ApiResult<UptimeInfo> {
    fetch(&state, "uptime", |agg| agg.uptime()).await
}

/// Never fails as a whole; per-domain failures are listed in `errors`.
async fn system<C: Channel + 'static>(
    State(state): State<AppStateArc<C>>,
) -> ApiResult<SystemSnapshot> {
    fetch(&state, "system", |agg| Ok(agg.system())).await
}
