//! Health check handlers.

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    pub backend: String,
    pub jobs_queued: usize,
    pub jobs_in_flight: usize,
}

/// Health check endpoint (liveness probe).
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        backend: state.dispatcher.backend().to_string(),
        jobs_queued: state.dispatcher.queued(),
        jobs_in_flight: state.dispatcher.in_flight(),
    })
}

#[derive(Serialize)]
pub struct RootResponse {
    pub message: String,
}

/// Root liveness message.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "SoraWM watermark removal server is running".to_string(),
    })
}
