//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use clinic_common::events::{ARRIVALS_CHANNEL, SCHEDULE_CHANNEL};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub entries: usize,
    pub schedule_subscribers: usize,
    pub arrival_subscribers: usize,
}

/// GET /health
///
/// Does not require a session.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        module: "clinic-portal".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        entries: state.store.len().await,
        schedule_subscribers: state.hub.subscriber_count(SCHEDULE_CHANNEL),
        arrival_subscribers: state.hub.subscriber_count(ARRIVALS_CHANNEL),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
