//! HTTP endpoints for telldus-sync.
//!
//! - `GET /sync` runs one sync and answers with a plain-text summary
//! - `GET /api/health` service health check
//! - `GET /api/status` run lock state and the last run's report
//! - `GET /api/sensors/{id}` persisted watermark for one sensor
//!
//! ## Error Handling
//!
//! Client errors (not found, conflict) return `{"error": "..."}` with a 4xx
//! status. Server-side failures are logged in full and answered with a
//! plain `500 An internal error occurred.` so nothing internal leaks.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use telldus_core::{SyncError, SyncReport};
use telldus_types::WatermarkRecord;
use time::OffsetDateTime;
use tracing::error;

use crate::state::AppState;

/// Body returned for every server-side failure.
pub const INTERNAL_ERROR_BODY: &str = "An internal error occurred.";

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sync", get(sync))
        .route("/api/health", get(health))
        .route("/api/status", get(get_status))
        .route("/api/sensors/{id}", get(get_sensor))
}

/// Run one sync.
///
/// 200 when every sensor synced, 207 when some failed (their ids are listed).
async fn sync(State(state): State<Arc<AppState>>) -> Result<(StatusCode, String), AppError> {
    let report = state.run_sync().await?;

    if report.is_complete() {
        return Ok((StatusCode::OK, report.summary()));
    }

    let failed = report
        .failed_sensor_ids()
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Ok((
        StatusCode::MULTI_STATUS,
        format!("{}; failed sensors: {}", report.summary(), failed),
    ))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

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
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Whether a sync run holds the run lock right now.
    pub running: bool,
    pub batch_size: usize,
    pub concurrency: usize,
    /// Report of the most recent completed run.
    pub last_sync: Option<SyncReport>,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let options = state.syncer.options();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at,
        running: state.syncer.is_running(),
        batch_size: options.batch_size,
        concurrency: options.concurrency,
        last_sync: state.last_report.read().await.clone(),
    })
}

async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<WatermarkRecord>, AppError> {
    state
        .syncer
        .watermarks()
        .record(id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("sensor {} not found", id)))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    Conflict(String),
    Store(telldus_store::Error),
    Sync(SyncError),
}

impl From<telldus_store::Error> for AppError {
    fn from(e: telldus_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::AlreadyRunning => AppError::Conflict(e.to_string()),
            e => AppError::Sync(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Store(e) => {
                error!("Store error: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response();
            }
            AppError::Sync(e) => {
                error!("Sync failed: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response();
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
