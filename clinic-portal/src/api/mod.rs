//! HTTP API handlers for clinic-portal

pub mod auth;
pub mod broadcast;
pub mod health;
pub mod schedule;
pub mod sse;

pub use health::health_routes;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use clinic_common::Error;
use serde_json::json;
use tracing::error;

/// Error response with a JSON `{ "error": message }` body
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) | Error::Io(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Serialization(_) | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let message = match &self.0 {
            // User-facing text without the variant prefix
            Error::Validation(msg) => msg.clone(),
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
