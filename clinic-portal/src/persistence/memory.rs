//! In-memory repository for tests and `--ephemeral` runs

use async_trait::async_trait;
use chrono::Utc;
use clinic_common::events::ChangeEvent;
use clinic_common::model::{EntryPatch, NewEntry, ScheduleEntry};
use clinic_common::{uuid_utils, Error, Result};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{broadcast, Mutex};

use super::{ScheduleRepository, CHANGE_FEED_CAPACITY};

/// Vec-backed repository with switchable failures
pub struct InMemoryRepository {
    rows: Mutex<Vec<ScheduleEntry>>,
    changes: broadcast::Sender<ChangeEvent>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    update_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::with_entries(Vec::new())
    }

    /// Repository preloaded with rows, bypassing the change feed
    pub fn with_entries(entries: Vec<ScheduleEntry>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            rows: Mutex::new(entries),
            changes,
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
            update_calls: AtomicUsize::new(0),
        }
    }

    /// Make `list` fail as if the store were unreachable
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make `insert` and `update` fail as if the store were unreachable
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of `update` calls seen, successful or not
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Current rows, as the backing store sees them
    pub async fn rows(&self) -> Vec<ScheduleEntry> {
        self.rows.lock().await.clone()
    }

    fn unreachable() -> Error {
        Error::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "schedule store unreachable",
        ))
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by_key(|e| e.created_at);
        Ok(rows)
    }

    async fn insert(&self, entry: NewEntry) -> Result<ScheduleEntry> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        let record = ScheduleEntry {
            id: uuid_utils::generate_entry_id(),
            notes: entry.normalized_notes(),
            resident_name: entry.resident_name.trim().to_string(),
            faculty_name: entry.faculty_name.trim().to_string(),
            day: entry.day,
            clinic_time: entry.clinic_time,
            appointment_time: entry.appointment_time,
            patient_name: entry.patient_name.trim().to_string(),
            clinic_number: entry.clinic_number.trim().to_string(),
            arrived: false,
            seen: false,
            created_at: Utc::now(),
        };
        self.rows.lock().await.push(record.clone());
        let _ = self.changes.send(ChangeEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<()> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Self::unreachable());
        }
        {
            let mut rows = self.rows.lock().await;
            let row = rows
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| Error::NotFound(format!("schedule entry {}", id)))?;
            row.apply(patch);
        }
        let _ = self.changes.send(ChangeEvent::Updated {
            id: id.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
