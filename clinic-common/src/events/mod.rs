//! Event types for the clinic realtime layer
//!
//! Provides the typed broadcast payloads and the EventBus used for
//! in-process fan-out.

mod arrival_types;

pub use arrival_types::ArrivalSnapshot;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::model::{EntryPatch, ScheduleEntry};
use crate::{Error, Result};

/// Channel carrying `entry_added` / `entry_updated` echoes
pub const SCHEDULE_CHANNEL: &str = "schedule";

/// Channel carrying `arrival` broadcasts
pub const ARRIVALS_CHANNEL: &str = "arrivals";

/// Realtime event types
///
/// Every payload crossing a channel boundary is parsed into this enum by
/// [`ClinicEvent::from_wire`]; nothing downstream sees untyped JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClinicEvent {
    /// A record was inserted (server confirmed)
    ///
    /// Triggers:
    /// - Schedule Store: insert if the id is not yet present
    /// - SSE: refresh schedule views
    EntryInserted {
        entry: ScheduleEntry,
    },

    /// Some fields of a record changed
    ///
    /// Triggers:
    /// - Schedule Store: merge fields by id, no-op for unknown ids
    EntryUpdated {
        id: String,
        patch: EntryPatch,
    },

    /// A patient was marked arrived
    ///
    /// Triggers:
    /// - Arrival Notifier: one-shot alert for the matching faculty session
    Arrival {
        snapshot: ArrivalSnapshot,
    },
}

impl ClinicEvent {
    /// Variant name, used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            ClinicEvent::EntryInserted { .. } => "EntryInserted",
            ClinicEvent::EntryUpdated { .. } => "EntryUpdated",
            ClinicEvent::Arrival { .. } => "Arrival",
        }
    }

    /// Event name on the broadcast wire
    pub fn wire_name(&self) -> &'static str {
        match self {
            ClinicEvent::EntryInserted { .. } => "entry_added",
            ClinicEvent::EntryUpdated { .. } => "entry_updated",
            ClinicEvent::Arrival { .. } => "arrival",
        }
    }

    /// Named channel the event belongs on
    pub fn channel(&self) -> &'static str {
        match self {
            ClinicEvent::Arrival { .. } => ARRIVALS_CHANNEL,
            _ => SCHEDULE_CHANNEL,
        }
    }

    /// Wire payload: full entry, `{id, ..changed fields}`, or arrival snapshot
    pub fn wire_payload(&self) -> Result<Value> {
        let value = match self {
            ClinicEvent::EntryInserted { entry } => serde_json::to_value(entry)?,
            ClinicEvent::EntryUpdated { id, patch } => serde_json::to_value(UpdatePayload {
                id: id.clone(),
                patch: patch.clone(),
            })?,
            ClinicEvent::Arrival { snapshot } => serde_json::to_value(snapshot)?,
        };
        Ok(value)
    }

    /// Validate and type an incoming broadcast
    pub fn from_wire(event_name: &str, payload: Value) -> Result<Self> {
        let event = match event_name {
            "entry_added" => ClinicEvent::EntryInserted {
                entry: typed(event_name, payload)?,
            },
            "entry_updated" => {
                let update: UpdatePayload = typed(event_name, payload)?;
                ClinicEvent::EntryUpdated {
                    id: update.id,
                    patch: update.patch,
                }
            }
            "arrival" => ClinicEvent::Arrival {
                snapshot: typed(event_name, payload)?,
            },
            other => {
                return Err(Error::InvalidInput(format!("unknown broadcast event: {}", other)))
            }
        };

        let id = match &event {
            ClinicEvent::EntryInserted { entry } => &entry.id,
            ClinicEvent::EntryUpdated { id, .. } => id,
            ClinicEvent::Arrival { snapshot } => &snapshot.entry_id,
        };
        if id.trim().is_empty() {
            return Err(Error::InvalidInput(format!("{} payload without entry id", event_name)));
        }
        Ok(event)
    }

    /// Record change carried by this event, if any
    pub fn as_change(&self) -> Option<ChangeEvent> {
        match self {
            ClinicEvent::EntryInserted { entry } => Some(ChangeEvent::Inserted(entry.clone())),
            ClinicEvent::EntryUpdated { id, patch } => Some(ChangeEvent::Updated {
                id: id.clone(),
                patch: patch.clone(),
            }),
            ClinicEvent::Arrival { .. } => None,
        }
    }
}

/// Malformed payloads are the sender's fault, not ours
fn typed<T: DeserializeOwned>(event_name: &str, payload: Value) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| Error::InvalidInput(format!("{} payload: {}", event_name, e)))
}

#[derive(Serialize, Deserialize)]
struct UpdatePayload {
    id: String,
    #[serde(flatten)]
    patch: EntryPatch,
}

/// Row change notification from the persistence adapter
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    Inserted(ScheduleEntry),
    Updated { id: String, patch: EntryPatch },
}

impl From<ChangeEvent> for ClinicEvent {
    fn from(change: ChangeEvent) -> Self {
        match change {
            ChangeEvent::Inserted(entry) => ClinicEvent::EntryInserted { entry },
            ChangeEvent::Updated { id, patch } => ClinicEvent::EntryUpdated { id, patch },
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Broadcast bus for one named channel
///
/// Uses tokio::broadcast internally:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use clinic_common::events::{EventBus, ClinicEvent};
/// use clinic_common::model::EntryPatch;
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit(ClinicEvent::EntryUpdated {
///     id: "e-1".to_string(),
///     patch: EntryPatch::seen(true),
/// }).ok();
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "EntryUpdated");
/// ```
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<ClinicEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// * `capacity` - Number of events to buffer before dropping old events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<ClinicEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: ClinicEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<ClinicEvent>> {
        self.tx.send(event)
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClinicTime, Day};
    use chrono::Utc;
    use serde_json::json;

    fn sample_entry() -> ScheduleEntry {
        ScheduleEntry {
            id: "e-1".to_string(),
            resident_name: "Resident A".to_string(),
            faculty_name: "Dr. Sara".to_string(),
            day: Day::Monday,
            clinic_time: ClinicTime::AM,
            appointment_time: "09:00".parse().unwrap(),
            patient_name: "Ali".to_string(),
            clinic_number: "C-12".to_string(),
            notes: None,
            arrived: false,
            seen: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_wire_entry_added() {
        let entry = sample_entry();
        let payload = serde_json::to_value(&entry).unwrap();
        let event = ClinicEvent::from_wire("entry_added", payload).unwrap();
        assert_eq!(event, ClinicEvent::EntryInserted { entry });
        assert_eq!(event.channel(), SCHEDULE_CHANNEL);
    }

    #[test]
    fn test_from_wire_entry_updated_partial() {
        let event = ClinicEvent::from_wire("entry_updated", json!({"id": "e-1", "seen": true})).unwrap();
        match event {
            ClinicEvent::EntryUpdated { id, patch } => {
                assert_eq!(id, "e-1");
                assert_eq!(patch, EntryPatch::seen(true));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_wire_payload_round_trips_update() {
        let event = ClinicEvent::EntryUpdated {
            id: "e-9".to_string(),
            patch: EntryPatch::arrived(false),
        };
        let payload = event.wire_payload().unwrap();
        assert_eq!(payload, json!({"id": "e-9", "arrived": false}));
        assert_eq!(ClinicEvent::from_wire(event.wire_name(), payload).unwrap(), event);
    }

    #[test]
    fn test_from_wire_rejects_bad_payloads() {
        assert!(ClinicEvent::from_wire("entry_deleted", json!({"id": "x"})).is_err());
        assert!(ClinicEvent::from_wire("entry_updated", json!({"seen": true})).is_err());
        assert!(ClinicEvent::from_wire("entry_updated", json!({"id": "  "})).is_err());
        assert!(matches!(
            ClinicEvent::from_wire("arrival", json!({"facultyName": "Dr. Sara"})),
            Err(Error::InvalidInput(_))
        ));
        let mut bad = serde_json::to_value(sample_entry()).unwrap();
        bad["day"] = json!("Friday");
        assert!(ClinicEvent::from_wire("entry_added", bad).is_err());
    }

    #[test]
    fn test_arrival_on_arrivals_channel() {
        let snapshot = ArrivalSnapshot::from_entry(&sample_entry(), Utc::now());
        let event = ClinicEvent::Arrival { snapshot: snapshot.clone() };
        assert_eq!(event.channel(), ARRIVALS_CHANNEL);
        assert!(event.as_change().is_none());

        let payload = event.wire_payload().unwrap();
        assert_eq!(payload["facultyName"], "Dr. Sara");
        assert_eq!(payload["clinicNumber"], "C-12");
        assert_eq!(ClinicEvent::from_wire("arrival", payload).unwrap(), event);
    }

    #[test]
    fn test_change_event_conversion() {
        let change = ChangeEvent::Updated {
            id: "e-1".to_string(),
            patch: EntryPatch::seen(true),
        };
        let event: ClinicEvent = change.clone().into();
        assert_eq!(event.as_change(), Some(change));
    }

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(ClinicEvent::EntryInserted { entry: sample_entry() })
            .expect("emit should succeed");

        assert_eq!(rx1.try_recv().unwrap().event_type(), "EntryInserted");
        assert_eq!(rx2.try_recv().unwrap().event_type(), "EntryInserted");
    }

    #[test]
    fn test_eventbus_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert!(bus
            .emit(ClinicEvent::EntryUpdated {
                id: "e".to_string(),
                patch: EntryPatch::seen(true),
            })
            .is_err());
    }
}
