//! Health check and unknown-endpoint handling.

use crate::web::{AppState, response::ApiError};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::{Value, json};

/// `GET /api/health`
#[allow(clippy::cast_precision_loss)]
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let now = Utc::now();
    let uptime = (now - state.started_at).num_milliseconds() as f64 / 1000.0;

    Json(json!({
        "success": true,
        "message": "Session Records Management System is running",
        "timestamp": now.to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": uptime,
    }))
}

/// Fallback for unknown `/api` paths.
pub async fn api_not_found() -> ApiError {
    ApiError::with_status(StatusCode::NOT_FOUND, "Endpoint not found")
}
