//! Health check endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub notifications: &'static str,
}

/// GET /health — liveness plus whether booking emails are being delivered.
pub async fn check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let notifications = if state.engine.notifier().is_enabled() {
        "enabled"
    } else {
        "disabled"
    };
    Json(HealthResponse {
        status: "ok",
        notifications,
    })
}
