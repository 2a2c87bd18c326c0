//! Tests for database initialization
//!
//! - Database file and parent folders are created on first run
//! - Re-opening an existing database keeps its rows
//! - Rows decode into schedule entries

use chrono::{TimeZone, Utc};
use clinic_common::db::{init_database, init_memory_database, EntryRow, SCHEMA_VERSION};
use clinic_common::model::{ClinicTime, Day, ScheduleEntry};

async fn insert_row(pool: &sqlx::SqlitePool, id: &str, day: &str) {
    sqlx::query(
        "INSERT INTO schedule_entries (id, resident_name, faculty_name, day, clinic_time, \
         appointment_time, patient_name, clinic_number, notes, arrived, seen, created_at_us) \
         VALUES (?, 'Resident A', 'Dr. Sara', ?, 'AM', '09:00', 'Ali', 'C-12', NULL, 0, 0, ?)",
    )
    .bind(id)
    .bind(day)
    .bind(Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap().timestamp_micros())
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("clinic.db");

    let pool = init_database(&db_path).await.expect("init should succeed");
    assert!(db_path.exists(), "Database file was not created");

    let version: i64 = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(version, SCHEMA_VERSION);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("clinic.db");

    let pool = init_database(&db_path).await.unwrap();
    insert_row(&pool, "e-1", "Monday").await;
    pool.close().await;

    let pool = init_database(&db_path).await.expect("reopen should succeed");
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schedule_entries")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_row_decodes_into_entry() {
    let pool = init_memory_database().await.unwrap();
    insert_row(&pool, "e-7", "Tuesday").await;

    let row: EntryRow = sqlx::query_as("SELECT * FROM schedule_entries WHERE id = ?")
        .bind("e-7")
        .fetch_one(&pool)
        .await
        .unwrap();
    let entry = ScheduleEntry::try_from(row).unwrap();
    assert_eq!(entry.day, Day::Tuesday);
    assert_eq!(entry.clinic_time, ClinicTime::AM);
    assert_eq!(entry.appointment_time.to_string(), "09:00");
    assert!(!entry.arrived);
    assert_eq!(entry.created_at, Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap());
}

#[tokio::test]
async fn test_schema_rejects_unknown_day() {
    let pool = init_memory_database().await.unwrap();
    let result = sqlx::query(
        "INSERT INTO schedule_entries (id, resident_name, faculty_name, day, clinic_time, \
         appointment_time, patient_name, clinic_number, created_at_us) \
         VALUES ('x', 'r', 'f', 'Friday', 'AM', '09:00', 'p', 'c', 0)",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err());
}
