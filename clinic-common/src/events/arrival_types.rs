//! Arrival broadcast payload

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AppointmentTime, ClinicTime, Day, ScheduleEntry};

/// Identifying fields of an entry at the moment it was marked arrived
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalSnapshot {
    /// Entry the arrival belongs to
    pub entry_id: String,
    pub faculty_name: String,
    pub resident_name: String,
    pub clinic_number: String,
    pub patient_name: String,
    pub appointment_time: AppointmentTime,
    pub day: Day,
    pub clinic_time: ClinicTime,
    /// When the toggling client committed the arrival. Redelivery of the same
    /// arrival carries the same instant; a later re-arrival carries a new one.
    pub arrived_at: DateTime<Utc>,
}

impl ArrivalSnapshot {
    pub fn from_entry(entry: &ScheduleEntry, arrived_at: DateTime<Utc>) -> Self {
        Self {
            entry_id: entry.id.clone(),
            faculty_name: entry.faculty_name.clone(),
            resident_name: entry.resident_name.clone(),
            clinic_number: entry.clinic_number.clone(),
            patient_name: entry.patient_name.clone(),
            appointment_time: entry.appointment_time,
            day: entry.day,
            clinic_time: entry.clinic_time,
            arrived_at,
        }
    }

    /// Key that identifies one arrival across redeliveries
    pub fn arrival_key(&self) -> (String, DateTime<Utc>) {
        (self.entry_id.clone(), self.arrived_at)
    }
}
