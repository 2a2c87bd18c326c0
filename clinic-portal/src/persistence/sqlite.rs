//! SQLite-backed repository

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use clinic_common::db::EntryRow;
use clinic_common::events::ChangeEvent;
use clinic_common::model::{EntryPatch, NewEntry, ScheduleEntry};
use clinic_common::{uuid_utils, Error, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::broadcast;
use tracing::debug;

use super::{ScheduleRepository, CHANGE_FEED_CAPACITY};

/// Repository over the `schedule_entries` table
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    changes: broadcast::Sender<ChangeEvent>,
}

impl SqliteRepository {
    pub fn new(pool: SqlitePool) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self { pool, changes }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn announce(&self, change: ChangeEvent) {
        // No attached store is fine
        let _ = self.changes.send(change);
    }
}

#[async_trait]
impl ScheduleRepository for SqliteRepository {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn list(&self) -> Result<Vec<ScheduleEntry>> {
        let rows: Vec<EntryRow> =
            sqlx::query_as("SELECT * FROM schedule_entries ORDER BY created_at_us ASC, rowid ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(ScheduleEntry::try_from).collect()
    }

    async fn insert(&self, entry: NewEntry) -> Result<ScheduleEntry> {
        // Stored at microsecond precision; truncate so the returned record
        // equals what a later list() decodes
        let created_at = Utc::now().trunc_subsecs(6);
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
            created_at,
        };

        sqlx::query(
            r#"
            INSERT INTO schedule_entries (
                id, resident_name, faculty_name, day, clinic_time, appointment_time,
                patient_name, clinic_number, notes, arrived, seen, created_at_us
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.resident_name)
        .bind(&record.faculty_name)
        .bind(record.day.as_str())
        .bind(record.clinic_time.as_str())
        .bind(record.appointment_time.to_string())
        .bind(&record.patient_name)
        .bind(&record.clinic_number)
        .bind(&record.notes)
        .bind(record.arrived)
        .bind(record.seen)
        .bind(record.created_at.timestamp_micros())
        .execute(&self.pool)
        .await?;

        debug!("Inserted schedule entry {}", record.id);
        self.announce(ChangeEvent::Inserted(record.clone()));
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &EntryPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE schedule_entries SET ");
        let mut columns = query.separated(", ");
        if let Some(v) = &patch.resident_name {
            columns.push("resident_name = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.faculty_name {
            columns.push("faculty_name = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.day {
            columns.push("day = ").push_bind_unseparated(v.as_str());
        }
        if let Some(v) = patch.clinic_time {
            columns.push("clinic_time = ").push_bind_unseparated(v.as_str());
        }
        if let Some(v) = patch.appointment_time {
            columns.push("appointment_time = ").push_bind_unseparated(v.to_string());
        }
        if let Some(v) = &patch.patient_name {
            columns.push("patient_name = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.clinic_number {
            columns.push("clinic_number = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = &patch.notes {
            columns.push("notes = ").push_bind_unseparated(v.clone());
        }
        if let Some(v) = patch.arrived {
            columns.push("arrived = ").push_bind_unseparated(v);
        }
        if let Some(v) = patch.seen {
            columns.push("seen = ").push_bind_unseparated(v);
        }
        query.push(" WHERE id = ").push_bind(id.to_string());

        let result = query.build().execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("schedule entry {}", id)));
        }

        self.announce(ChangeEvent::Updated {
            id: id.to_string(),
            patch: patch.clone(),
        });
        Ok(())
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}
