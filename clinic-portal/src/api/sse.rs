//! Server-Sent Events (SSE) streams
//!
//! - `/api/events`: schedule channel echoes (`entry_added`, `entry_updated`)
//! - `/api/alerts`: arrival alerts addressed to the requesting viewer

use async_trait::async_trait;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Extension,
};
use clinic_common::events::{ARRIVALS_CHANNEL, SCHEDULE_CHANNEL};
use clinic_common::identity::{Identity, IdentityState};
use clinic_common::sse::{broadcast_event_stream, with_keep_alive};
use clinic_common::{Error, Result};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::ApiError;
use crate::notifier::{AlertSink, ArrivalAlert, ArrivalNotifier, ToneSpec};
use crate::AppState;

/// Alerts buffered per connection before the notifier waits
const ALERT_BUFFER: usize = 16;

/// GET /api/events
pub async fn schedule_events(
    State(state): State<AppState>,
) -> std::result::Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, ApiError> {
    let subscription = state.hub.subscribe(SCHEDULE_CHANNEL)?;
    let stream = broadcast_event_stream(subscription.into_receiver(), SCHEDULE_CHANNEL);
    Ok(with_keep_alive(stream))
}

/// Alert output for one SSE connection
#[derive(Debug, Clone)]
pub enum AlertMessage {
    Modal(ArrivalAlert),
    Tone(ToneSpec),
}

impl AlertMessage {
    fn into_event(self) -> Option<Event> {
        let encoded = match &self {
            AlertMessage::Modal(alert) => Event::default().event("arrival_alert").json_data(alert),
            AlertMessage::Tone(tone) => Event::default().event("arrival_tone").json_data(tone),
        };
        match encoded {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Failed to encode alert: {}", e);
                None
            }
        }
    }
}

/// Sink that forwards alerts to an SSE connection
pub struct SseAlertSink {
    tx: mpsc::Sender<AlertMessage>,
}

impl SseAlertSink {
    pub fn new(tx: mpsc::Sender<AlertMessage>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AlertSink for SseAlertSink {
    async fn show_modal(&self, alert: &ArrivalAlert) -> Result<()> {
        self.tx
            .send(AlertMessage::Modal(alert.clone()))
            .await
            .map_err(|_| Error::Internal("alert stream closed".to_string()))
    }

    async fn play_tone(&self, tone: &ToneSpec) -> Result<()> {
        self.tx
            .send(AlertMessage::Tone(*tone))
            .await
            .map_err(|_| Error::Internal("alert stream closed".to_string()))
    }
}

/// GET /api/alerts
///
/// The notifier lives as long as the connection: closing the stream drops
/// its handle and releases the arrivals subscription.
pub async fn arrival_alerts(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> std::result::Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>, ApiError> {
    let arrivals = state.hub.subscribe(ARRIVALS_CHANNEL)?;
    let (tx, mut rx) = mpsc::channel(ALERT_BUFFER);
    let viewer_name = identity.display_identity().unwrap_or_default();
    let (viewer_tx, viewer_rx) = watch::channel(IdentityState::Resolved(identity));

    let notifier = ArrivalNotifier::new(Arc::new(SseAlertSink::new(tx)))
        .with_tone(state.tone)
        .spawn(arrivals, viewer_rx);
    info!("Alert stream opened for {}", viewer_name);

    let stream = async_stream::stream! {
        let _notifier = notifier;
        let _viewer = viewer_tx;

        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        while let Some(message) = rx.recv().await {
            if let Some(event) = message.into_event() {
                yield Ok(event);
            }
        }
    };

    Ok(with_keep_alive(stream))
}
