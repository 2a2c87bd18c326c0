//! Background write bookkeeping for flag toggles

use clinic_common::model::EntryPatch;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// Flag written by a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WriteField {
    Arrived,
    Seen,
}

impl WriteField {
    pub fn patch(self, value: bool) -> EntryPatch {
        match self {
            WriteField::Arrived => EntryPatch::arrived(value),
            WriteField::Seen => EntryPatch::seen(value),
        }
    }
}

impl fmt::Display for WriteField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteField::Arrived => write!(f, "arrived"),
            WriteField::Seen => write!(f, "seen"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "error", rename_all = "camelCase")]
pub enum WriteStatus {
    Pending,
    Confirmed,
    Failed(String),
}

/// Latest write outcome per flag; `None` if the flag was never toggled here
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntryWriteStatus {
    pub arrived: Option<WriteStatus>,
    pub seen: Option<WriteStatus>,
}

#[derive(Default)]
pub(crate) struct WriteTracker {
    inner: Mutex<TrackerState>,
}

#[derive(Default)]
struct TrackerState {
    next_seq: u64,
    latest: HashMap<(String, WriteField), (u64, WriteStatus)>,
}

impl WriteTracker {
    /// Record a new pending write and return its sequence number
    pub(crate) fn begin(&self, id: &str, field: WriteField) -> u64 {
        let mut state = self.lock();
        state.next_seq += 1;
        let seq = state.next_seq;
        state
            .latest
            .insert((id.to_string(), field), (seq, WriteStatus::Pending));
        seq
    }

    /// Record an outcome unless a newer write has superseded this one
    pub(crate) fn finish(&self, id: &str, field: WriteField, seq: u64, status: WriteStatus) {
        let mut state = self.lock();
        if let Some(slot) = state.latest.get_mut(&(id.to_string(), field)) {
            if slot.0 == seq {
                slot.1 = status;
            }
        }
    }

    pub(crate) fn status(&self, id: &str) -> EntryWriteStatus {
        let state = self.lock();
        let get = |field: WriteField| {
            state
                .latest
                .get(&(id.to_string(), field))
                .map(|(_, status)| status.clone())
        };
        EntryWriteStatus {
            arrived: get(WriteField::Arrived),
            seen: get(WriteField::Seen),
        }
    }

    /// Forget every tracked write. Writes still in flight report into nothing.
    pub(crate) fn clear(&self) {
        self.lock().latest.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        // Bookkeeping only; a poisoned lock still holds usable state
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
