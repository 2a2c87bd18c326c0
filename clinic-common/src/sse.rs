//! Server-Sent Events (SSE) utilities
//!
//! Shared encoding of [`ClinicEvent`]s for the portal's event streams.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::events::ClinicEvent;

/// Keep-alive interval for every portal stream
pub const KEEP_ALIVE_SECS: u64 = 15;

/// Encode one event: SSE `event` is the wire name, `data` the wire payload
pub fn encode_event(event: &ClinicEvent) -> Option<Event> {
    let payload = match event.wire_payload() {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Failed to serialize {} event: {}", event.event_type(), e);
            return None;
        }
    };
    match Event::default().event(event.wire_name()).json_data(payload) {
        Ok(sse_event) => Some(sse_event),
        Err(e) => {
            warn!("Failed to encode SSE event: {}", e);
            None
        }
    }
}

/// Stream every event from a channel subscription.
///
/// Lagged receivers skip what they missed and keep streaming.
pub fn broadcast_event_stream(
    rx: broadcast::Receiver<ClinicEvent>,
    channel: &'static str,
) -> impl Stream<Item = Result<Event, Infallible>> {
    info!("New SSE client connected to {} channel", channel);

    BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(event) => {
                debug!("SSE {}: {}", channel, event.wire_name());
                encode_event(&event).map(Ok)
            }
            Err(e) => {
                warn!("SSE {} stream error: {:?}", channel, e);
                None
            }
        }
    })
}

/// Wrap a stream with the portal's keep-alive
pub fn with_keep_alive<S>(stream: S) -> Sse<S>
where
    S: Stream<Item = Result<Event, Infallible>> + Send + 'static,
{
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECS))
            .text("keep-alive"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntryPatch;

    #[test]
    fn test_encode_event_uses_wire_name() {
        let event = ClinicEvent::EntryUpdated {
            id: "e-1".to_string(),
            patch: EntryPatch::seen(true),
        };
        assert!(encode_event(&event).is_some());
    }

    #[tokio::test]
    async fn test_broadcast_stream_yields_events() {
        let (tx, rx) = broadcast::channel(4);
        let mut stream = Box::pin(broadcast_event_stream(rx, "schedule"));
        tx.send(ClinicEvent::EntryUpdated {
            id: "e-1".to_string(),
            patch: EntryPatch::arrived(true),
        })
        .unwrap();
        drop(tx);
        assert!(stream.next().await.is_some());
        assert!(stream.next().await.is_none());
    }
}
