//! Schedule Store
//!
//! Owns the in-memory collection every view reads from. Three paths feed it:
//!
//! 1. initial load from the repository (or the mirror when that fails)
//! 2. local writes: submissions are confirmed before they appear; flag
//!    toggles apply immediately and persist in the background
//! 3. realtime reconciliation of inserts and updates made elsewhere
//!
//! Whatever the path, the collection stays in canonical slot order and holds
//! at most one record per id.

mod writes;


pub use writes::{EntryWriteStatus, WriteField, WriteStatus};

use chrono::{DateTime, Utc};
use clinic_common::events::{ArrivalSnapshot, ChangeEvent, ClinicEvent, SCHEDULE_CHANNEL};
use clinic_common::identity::Identity;
use clinic_common::model::{EntryPatch, NewEntry, ScheduleEntry, ScheduleFilter};
use clinic_common::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::mirror::{self, LocalMirror};
use crate::persistence::ScheduleRepository;
use crate::realtime::RealtimeHub;
use crate::task::TaskHandle;
use writes::WriteTracker;

/// Where the initial load came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Repository(usize),
    /// Repository unreachable; the mirror copy is shown instead
    Mirror(usize),
}

pub struct ScheduleStore {
    entries: RwLock<Vec<ScheduleEntry>>,
    /// Last reset; records created before it stay hidden
    reset_at: RwLock<Option<DateTime<Utc>>>,
    repo: Arc<dyn ScheduleRepository>,
    hub: RealtimeHub,
    mirror: Arc<dyn LocalMirror>,
    /// Bumped under the `entries` write lock on every change
    revision: AtomicU64,
    /// Revision last written to the mirror; serializes mirror writes
    mirrored: Mutex<u64>,
    writes: Arc<WriteTracker>,
}

impl ScheduleStore {
    pub fn new(
        repo: Arc<dyn ScheduleRepository>,
        hub: RealtimeHub,
        mirror: Arc<dyn LocalMirror>,
    ) -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            reset_at: RwLock::new(None),
            repo,
            hub,
            mirror,
            revision: AtomicU64::new(0),
            mirrored: Mutex::new(0),
            writes: Arc::new(WriteTracker::default()),
        }
    }

    pub fn hub(&self) -> &RealtimeHub {
        &self.hub
    }

    /// Seed the collection and the reset watermark from the mirror
    pub async fn hydrate_from_mirror(&self) -> usize {
        let reset_at = mirror::load_last_reset(self.mirror.as_ref()).await;
        let cached = mirror::load_entries(self.mirror.as_ref()).await;

        *self.reset_at.write().await = reset_at;
        let mut entries = self.entries.write().await;
        *entries = Self::visible(cached, reset_at);
        debug!("Hydrated {} entries from mirror", entries.len());
        entries.len()
    }

    /// Replace the collection with the repository's contents.
    ///
    /// When the repository is unreachable the mirror copy stands in.
    pub async fn initial_load(&self) -> LoadSource {
        match self.repo.list().await {
            Ok(rows) => {
                let (revision, snapshot) = {
                    let mut entries = self.entries.write().await;
                    let reset_at = *self.reset_at.read().await;
                    *entries = Self::visible(rows, reset_at);
                    (self.bump(), entries.clone())
                };
                let loaded = snapshot.len();
                info!("Loaded {} schedule entries from {}", loaded, self.repo.backend_name());
                self.mirror_snapshot(revision, snapshot).await;
                LoadSource::Repository(loaded)
            }
            Err(e) => {
                warn!("Initial load failed, falling back to mirror: {}", e);
                let cached = mirror::load_entries(self.mirror.as_ref()).await;
                let mut entries = self.entries.write().await;
                let reset_at = *self.reset_at.read().await;
                *entries = Self::visible(cached, reset_at);
                LoadSource::Mirror(entries.len())
            }
        }
    }

    /// Submit a new entry.
    ///
    /// Nothing is shown until the repository confirms the write; on failure
    /// the collection is untouched and the error is returned.
    pub async fn add_entry(&self, identity: &Identity, entry: NewEntry) -> Result<ScheduleEntry> {
        if !identity.is_authenticated() {
            return Err(Error::Unauthenticated);
        }
        entry.validate()?;

        let record = match self.repo.insert(entry).await {
            Ok(record) => record,
            Err(e) => {
                error!("Failed to add schedule entry: {}", e);
                return Err(e);
            }
        };

        self.insert_if_absent(record.clone(), false).await;
        self.hub.publish(ClinicEvent::EntryInserted {
            entry: record.clone(),
        });
        info!(
            "Added entry {} for {} ({} {} {})",
            record.id, record.faculty_name, record.day, record.clinic_time, record.appointment_time
        );
        Ok(record)
    }

    /// Set the arrived flag. Returns false for unknown ids.
    ///
    /// A false-to-true transition also broadcasts an arrival.
    pub async fn toggle_arrived(&self, id: &str, value: bool) -> bool {
        self.toggle(id, WriteField::Arrived, value).await
    }

    /// Set the seen flag. Returns false for unknown ids.
    pub async fn toggle_seen(&self, id: &str, value: bool) -> bool {
        self.toggle(id, WriteField::Seen, value).await
    }

    async fn toggle(&self, id: &str, field: WriteField, value: bool) -> bool {
        let patch = field.patch(value);
        let (was_arrived, snapshot, revision, collection) = {
            let mut entries = self.entries.write().await;
            let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
                debug!("Ignoring {} toggle for unknown entry {}", field, id);
                return false;
            };
            let was_arrived = entry.arrived;
            entry.apply(&patch);
            let snapshot = entry.clone();
            (was_arrived, snapshot, self.bump(), entries.clone())
        };
        self.mirror_snapshot(revision, collection).await;

        self.hub.publish(ClinicEvent::EntryUpdated {
            id: id.to_string(),
            patch: patch.clone(),
        });
        if field == WriteField::Arrived && value && !was_arrived {
            self.hub.publish(ClinicEvent::Arrival {
                snapshot: ArrivalSnapshot::from_entry(&snapshot, Utc::now()),
            });
        }

        self.spawn_write(id.to_string(), field, patch);
        true
    }

    /// Persist one flag in the background. No rollback on failure.
    fn spawn_write(&self, id: String, field: WriteField, patch: EntryPatch) {
        let seq = self.writes.begin(&id, field);
        let repo = self.repo.clone();
        let writes = self.writes.clone();
        tokio::spawn(async move {
            match repo.update(&id, &patch).await {
                Ok(()) => writes.finish(&id, field, seq, WriteStatus::Confirmed),
                Err(e) => {
                    warn!("Failed to persist {} for entry {}: {}", field, id, e);
                    writes.finish(&id, field, seq, WriteStatus::Failed(e.to_string()));
                }
            }
        });
    }

    /// Background write state of an entry's flags
    pub fn write_status(&self, id: &str) -> EntryWriteStatus {
        self.writes.status(id)
    }

    /// Entries matching `filter`, in canonical order
    pub async fn get_filtered(&self, filter: &ScheduleFilter) -> Vec<ScheduleEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Whole collection, in canonical order
    pub async fn entries(&self) -> Vec<ScheduleEntry> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Merge a change made elsewhere. Idempotent; returns true if the
    /// collection changed.
    pub async fn reconcile(&self, change: ChangeEvent) -> bool {
        match change {
            ChangeEvent::Inserted(entry) => self.insert_if_absent(entry, true).await,
            ChangeEvent::Updated { id, patch } => {
                let (revision, snapshot) = {
                    let mut entries = self.entries.write().await;
                    let Some(entry) = entries.iter_mut().find(|e| e.id == id) else {
                        return false;
                    };
                    if !entry.apply(&patch) {
                        return false;
                    }
                    // Slot fields may have moved
                    clinic_common::model::sort_entries(&mut entries);
                    (self.bump(), entries.clone())
                };
                self.mirror_snapshot(revision, snapshot).await;
                true
            }
        }
    }

    /// Insert at the entry's slot unless its id is present. With `watermark`,
    /// records created before the last reset are refused.
    async fn insert_if_absent(&self, entry: ScheduleEntry, watermark: bool) -> bool {
        let (revision, snapshot) = {
            let mut entries = self.entries.write().await;
            if watermark {
                let reset_at = *self.reset_at.read().await;
                if reset_at.is_some_and(|at| entry.created_at < at) {
                    debug!("Ignoring insert of {} from before the last reset", entry.id);
                    return false;
                }
            }
            if entries.iter().any(|e| e.id == entry.id) {
                return false;
            }
            let key = entry.slot_key();
            let at = entries.partition_point(|e| e.slot_key() <= key);
            entries.insert(at, entry);
            (self.bump(), entries.clone())
        };
        self.mirror_snapshot(revision, snapshot).await;
        true
    }

    /// Clear the collection, the mirror and the write statuses, and remember when.
    pub async fn reset(&self, at: DateTime<Utc>) {
        let (cleared, revision) = {
            let mut entries = self.entries.write().await;
            let cleared = entries.len();
            entries.clear();
            *self.reset_at.write().await = Some(at);
            self.writes.clear();
            (cleared, self.bump())
        };

        {
            let mut mirrored = self.mirrored.lock().await;
            mirror::save_last_reset(self.mirror.as_ref(), at).await;
            if revision > *mirrored {
                mirror::clear_entries(self.mirror.as_ref()).await;
                *mirrored = revision;
            }
        }
        info!("Daily reset cleared {} entries at {}", cleared, at);
    }

    pub async fn last_reset(&self) -> Option<DateTime<Utc>> {
        *self.reset_at.read().await
    }

    /// Follow the repository's change feed and the schedule channel.
    ///
    /// Subscriptions are taken before this returns, so nothing published
    /// afterwards is missed. Dropping the handle detaches.
    pub fn attach_realtime(self: &Arc<Self>) -> Result<TaskHandle> {
        let mut changes = self.repo.subscribe_changes();
        let mut channel = self.hub.subscribe(SCHEDULE_CHANNEL)?;
        let store = Arc::clone(self);

        Ok(TaskHandle::spawn("schedule-sync", move |token| async move {
            info!("Schedule sync attached");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    change = changes.recv() => match change {
                        Ok(change) => {
                            store.reconcile(change).await;
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Change feed lagged, skipped {} notifications", skipped);
                        }
                        Err(RecvError::Closed) => {
                            info!("Change feed closed");
                            break;
                        }
                    },
                    event = channel.recv() => match event {
                        Some(event) => {
                            if let Some(change) = event.as_change() {
                                store.reconcile(change).await;
                            }
                        }
                        None => {
                            info!("Schedule channel closed");
                            break;
                        }
                    },
                }
            }
            debug!("Schedule sync detached");
        }))
    }

    /// Next collection revision; call with the `entries` write lock held
    fn bump(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Write a snapshot taken at `revision`, unless a newer one already landed.
    ///
    /// Runs after the `entries` lock is released so readers never wait on disk.
    async fn mirror_snapshot(&self, revision: u64, snapshot: Vec<ScheduleEntry>) {
        let mut mirrored = self.mirrored.lock().await;
        if revision <= *mirrored {
            debug!("Skipping stale mirror snapshot {} (have {})", revision, *mirrored);
            return;
        }
        mirror::save_entries(self.mirror.as_ref(), &snapshot).await;
        *mirrored = revision;
    }

    fn visible(mut rows: Vec<ScheduleEntry>, reset_at: Option<DateTime<Utc>>) -> Vec<ScheduleEntry> {
        if let Some(at) = reset_at {
            rows.retain(|e| e.created_at >= at);
        }
        let mut seen = std::collections::HashSet::new();
        rows.retain(|e| seen.insert(e.id.clone()));
        // Input arrives oldest first, so equal slots keep creation order
        clinic_common::model::sort_entries(&mut rows);
        rows
    }
}
