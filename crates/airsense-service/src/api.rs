//! REST API endpoints for the airsense service.
//!
//! The API exposes what the accessory framework sees: each sensor's
//! accessory information and its eight published characteristics.
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Collector state and per-sensor refresh statistics
//! - `GET /api/sensors` - All sensors with their published readings
//! - `GET /api/sensors/{id}` - One sensor
//! - `POST /api/sensors/{id}/refresh` - Run a refresh cycle now
//!
//! A manual refresh goes through the same overlap guard as the timer: if a
//! cycle is already in flight the request reports `dropped` and nothing
//! else happens.
//!
//! # Example
//!
//! ```ignore
//! use airsense_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use airsense_core::{Characteristic, CycleOutcome, CyclePhase, RefreshStats, SensorReading};

use crate::state::{AccessoryInfo, AppState, SensorHandle};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/sensors", get(list_sensors))
        .route("/api/sensors/{id}", get(get_sensor))
        .route("/api/sensors/{id}/refresh", post(refresh_sensor))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Service status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service version.
    pub version: &'static str,
    /// Current timestamp.
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Collector status.
    pub collector: CollectorStatus,
    /// Per-sensor refresh statistics.
    pub sensors: Vec<SensorStats>,
}

/// Collector status.
#[derive(Debug, Serialize)]
pub struct CollectorStatus {
    /// Whether the collector is running.
    pub running: bool,
    /// When the collector was started (if running).
    #[serde(with = "time::serde::rfc3339::option")]
    pub started_at: Option<OffsetDateTime>,
    /// How long the collector has been running (in seconds).
    pub uptime_seconds: Option<u64>,
    /// Characteristic writes since startup.
    pub characteristic_updates: u64,
}

/// Refresh statistics for one sensor.
#[derive(Debug, Serialize)]
pub struct SensorStats {
    pub id: Uuid,
    pub name: String,
    /// Seconds between refreshes.
    pub refresh_rate: u64,
    pub phase: CyclePhase,
    #[serde(flatten)]
    pub stats: RefreshStats,
}

/// Get service status including collector state and sensor stats.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let running = state.collector.is_running();
    let started_at = state.collector.started_at();
    let uptime_seconds = started_at.map(|s| {
        let now = OffsetDateTime::now_utc();
        (now - s).whole_seconds().max(0) as u64
    });

    let handles = state.sensors.read().await.clone();
    let mut sensors = Vec::with_capacity(handles.len());
    for handle in handles {
        sensors.push(SensorStats {
            id: handle.id,
            name: handle.info.name.clone(),
            refresh_rate: handle.refresher.interval().as_secs(),
            phase: handle.refresher.phase(),
            stats: handle.refresher.stats().await,
        });
    }

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
        collector: CollectorStatus {
            running,
            started_at,
            uptime_seconds,
            characteristic_updates: state.sink.updates(),
        },
        sensors,
    })
}

/// A sensor and its published state.
#[derive(Debug, Serialize)]
pub struct SensorResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub info: AccessoryInfo,
    /// Provider name as configured (`airnow`, `aqicn`, ...).
    pub provider: String,
    /// City, zip code or coordinates queried.
    pub location: String,
    pub phase: CyclePhase,
    pub reading: SensorReading,
    /// Published characteristic values by characteristic name.
    pub characteristics: BTreeMap<&'static str, f64>,
}

impl SensorResponse {
    async fn from_handle(handle: &SensorHandle) -> Self {
        let reading = handle.refresher.accessory().context().await;
        let query = handle.refresher.query();
        Self {
            id: handle.id,
            info: handle.info.clone(),
            provider: query.provider().to_string(),
            location: query.location().to_string(),
            phase: handle.refresher.phase(),
            characteristics: characteristics(&reading),
            reading,
        }
    }
}

fn characteristics(reading: &SensorReading) -> BTreeMap<&'static str, f64> {
    Characteristic::ALL
        .iter()
        .map(|c| (c.name(), c.value_of(reading)))
        .collect()
}

/// List all sensors.
async fn list_sensors(State(state): State<Arc<AppState>>) -> Json<Vec<SensorResponse>> {
    let handles = state.sensors.read().await.clone();
    let mut sensors = Vec::with_capacity(handles.len());
    for handle in &handles {
        sensors.push(SensorResponse::from_handle(handle).await);
    }
    Json(sensors)
}

/// Get one sensor.
async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SensorResponse>, AppError> {
    let handle = find_sensor(&state, &id).await?;
    Ok(Json(SensorResponse::from_handle(&handle).await))
}

/// Manual refresh response.
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub id: Uuid,
    /// `published`, `faulted` or `dropped`.
    pub outcome: &'static str,
    /// Reading published by the cycle, absent when dropped.
    pub reading: Option<SensorReading>,
    /// Why the cycle faulted.
    pub error: Option<String>,
}

/// Run a refresh cycle for one sensor now.
///
/// Returns 202 Accepted with outcome `dropped` when a cycle is already in
/// flight; 200 otherwise, including for a faulted cycle.
async fn refresh_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<RefreshResponse>), AppError> {
    let handle = find_sensor(&state, &id).await?;

    let (status, response) = match handle.refresher.tick().await {
        CycleOutcome::Published(reading) => (
            StatusCode::OK,
            RefreshResponse {
                id: handle.id,
                outcome: "published",
                reading: Some(reading),
                error: None,
            },
        ),
        CycleOutcome::Faulted { reading, error } => (
            StatusCode::OK,
            RefreshResponse {
                id: handle.id,
                outcome: "faulted",
                reading: Some(reading),
                error: Some(error.to_string()),
            },
        ),
        CycleOutcome::Dropped => (
            StatusCode::ACCEPTED,
            RefreshResponse {
                id: handle.id,
                outcome: "dropped",
                reading: None,
                error: None,
            },
        ),
    };

    Ok((status, Json(response)))
}

async fn find_sensor(state: &AppState, id: &str) -> Result<Arc<SensorHandle>, AppError> {
    let uuid = Uuid::parse_str(id)
        .map_err(|_| AppError::BadRequest(format!("Invalid sensor id: {}", id)))?;
    state
        .sensor(&uuid)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Sensor not found: {}", id)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
