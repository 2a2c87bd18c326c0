//! Database row models

use chrono::DateTime;

use crate::model::ScheduleEntry;
use crate::{Error, Result};

/// Row of `schedule_entries` as stored
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EntryRow {
    pub id: String,
    pub resident_name: String,
    pub faculty_name: String,
    pub day: String,
    pub clinic_time: String,
    pub appointment_time: String,
    pub patient_name: String,
    pub clinic_number: String,
    pub notes: Option<String>,
    pub arrived: bool,
    pub seen: bool,
    pub created_at_us: i64,
}

impl TryFrom<EntryRow> for ScheduleEntry {
    type Error = Error;

    fn try_from(row: EntryRow) -> Result<Self> {
        let created_at = DateTime::from_timestamp_micros(row.created_at_us).ok_or_else(|| {
            Error::InvalidInput(format!("entry {} has invalid created_at", row.id))
        })?;
        Ok(ScheduleEntry {
            day: row.day.parse()?,
            clinic_time: row.clinic_time.parse()?,
            appointment_time: row.appointment_time.parse()?,
            id: row.id,
            resident_name: row.resident_name,
            faculty_name: row.faculty_name,
            patient_name: row.patient_name,
            clinic_number: row.clinic_number,
            notes: row.notes,
            arrived: row.arrived,
            seen: row.seen,
            created_at,
        })
    }
}
