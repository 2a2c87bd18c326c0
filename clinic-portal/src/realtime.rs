//! Realtime fan-out
//!
//! One [`EventBus`] per named channel. Events are routed to the channel
//! their variant belongs on; raw payloads from outside the process are typed
//! through [`ClinicEvent::from_wire`] before anyone sees them.

use clinic_common::events::{ClinicEvent, EventBus, ARRIVALS_CHANNEL, SCHEDULE_CHANNEL};
use clinic_common::{Error, Result};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Named broadcast channels shared by every session in the process
#[derive(Clone, Debug)]
pub struct RealtimeHub {
    schedule: EventBus,
    arrivals: EventBus,
}

impl RealtimeHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            schedule: EventBus::new(capacity),
            arrivals: EventBus::new(capacity),
        }
    }

    fn bus(&self, channel: &str) -> Result<&EventBus> {
        match channel {
            SCHEDULE_CHANNEL => Ok(&self.schedule),
            ARRIVALS_CHANNEL => Ok(&self.arrivals),
            other => Err(Error::NotFound(format!("realtime channel {}", other))),
        }
    }

    /// Publish on the event's own channel. Returns the number of receivers.
    pub fn publish(&self, event: ClinicEvent) -> usize {
        let channel = event.channel();
        let name = event.wire_name();
        match self.bus(channel) {
            Ok(bus) => match bus.emit(event) {
                Ok(count) => {
                    debug!("Published {} on {} to {} subscribers", name, channel, count);
                    count
                }
                Err(_) => {
                    debug!("Published {} on {} with no subscribers", name, channel);
                    0
                }
            },
            Err(e) => {
                warn!("Dropping {}: {}", name, e);
                0
            }
        }
    }

    /// Validate an untyped broadcast and publish it on `channel`
    pub fn publish_wire(&self, channel: &str, event_name: &str, payload: Value) -> Result<usize> {
        self.bus(channel)?;
        let event = ClinicEvent::from_wire(event_name, payload)?;
        if event.channel() != channel {
            return Err(Error::InvalidInput(format!(
                "{} does not belong on channel {}",
                event_name, channel
            )));
        }
        Ok(self.publish(event))
    }

    pub fn subscribe(&self, channel: &'static str) -> Result<Subscription> {
        let rx = self.bus(channel)?.subscribe();
        debug!("Subscribed to {} channel", channel);
        Ok(Subscription { channel, rx })
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.bus(channel).map(EventBus::subscriber_count).unwrap_or(0)
    }
}

/// Live subscription to one channel; unsubscribes on drop
pub struct Subscription {
    channel: &'static str,
    rx: broadcast::Receiver<ClinicEvent>,
}

impl Subscription {
    /// Next event, or `None` once the channel is closed.
    ///
    /// A lagging subscriber skips what it missed and keeps going.
    pub async fn recv(&mut self) -> Option<ClinicEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{} subscriber lagged, skipped {} events", self.channel, skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Hand the raw receiver to a stream adapter
    pub fn into_receiver(self) -> broadcast::Receiver<ClinicEvent> {
        self.rx
    }
}
