//! Broadcast ingress
//!
//! Peers sharing this portal's channels (another portal process, a relay)
//! post raw broadcasts here. Payloads are typed before they reach any
//! subscriber; the store's realtime sync picks up schedule events from the
//! channel like any local publish.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use clinic_common::identity::Identity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Wire event name: `entry_added`, `entry_updated` or `arrival`
    pub event: String,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
pub struct BroadcastAccepted {
    pub delivered: usize,
}

/// POST /api/broadcast/:channel
///
/// 202 with the number of subscribers reached; 400 for an untyped payload or
/// an event on the wrong channel; 404 for an unknown channel.
pub async fn publish(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<BroadcastAccepted>), ApiError> {
    let delivered = state.hub.publish_wire(&channel, &body.event, body.payload)?;
    debug!(
        "Broadcast {} on {} from {:?}",
        body.event,
        channel,
        identity.display_identity()
    );
    Ok((StatusCode::ACCEPTED, Json(BroadcastAccepted { delivered })))
}
