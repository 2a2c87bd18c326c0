//! Schedule data model
//!
//! One [`ScheduleEntry`] is one patient appointment slot. Entries are always
//! exposed in canonical slot order: day, then clinic session, then
//! appointment time, with ties broken by creation time.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Clinic day. Declaration order is the slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Day {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
}

impl Day {
    /// All clinic days in slot order
    pub const ALL: [Day; 5] = [
        Day::Sunday,
        Day::Monday,
        Day::Tuesday,
        Day::Wednesday,
        Day::Thursday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Day::Sunday => "Sunday",
            Day::Monday => "Monday",
            Day::Tuesday => "Tuesday",
            Day::Wednesday => "Wednesday",
            Day::Thursday => "Thursday",
        }
    }
}

impl fmt::Display for Day {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Day {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Day::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("unknown clinic day: {}", s)))
    }
}

/// Morning or afternoon clinic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClinicTime {
    AM,
    PM,
}

impl ClinicTime {
    pub const ALL: [ClinicTime; 2] = [ClinicTime::AM, ClinicTime::PM];

    pub fn as_str(&self) -> &'static str {
        match self {
            ClinicTime::AM => "AM",
            ClinicTime::PM => "PM",
        }
    }
}

impl fmt::Display for ClinicTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClinicTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AM" => Ok(ClinicTime::AM),
            "PM" => Ok(ClinicTime::PM),
            other => Err(Error::InvalidInput(format!("unknown clinic time: {}", other))),
        }
    }
}

/// Wall-clock appointment time, minute precision, "HH:MM" on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppointmentTime(NaiveTime);

impl AppointmentTime {
    /// Build from hour and minute; `None` when out of range
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl fmt::Display for AppointmentTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for AppointmentTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self)
            .map_err(|_| Error::InvalidInput(format!("appointment time must be HH:MM, got {:?}", s)))
    }
}

impl Serialize for AppointmentTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AppointmentTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One patient appointment slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    /// Server-assigned, immutable
    pub id: String,
    pub resident_name: String,
    pub faculty_name: String,
    pub day: Day,
    pub clinic_time: ClinicTime,
    pub appointment_time: AppointmentTime,
    pub patient_name: String,
    pub clinic_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Set from the resident side
    #[serde(default)]
    pub arrived: bool,
    /// Set from the faculty side; independent of `arrived`
    #[serde(default)]
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl ScheduleEntry {
    /// Canonical ordering key
    pub fn slot_key(&self) -> (Day, ClinicTime, AppointmentTime, DateTime<Utc>) {
        (self.day, self.clinic_time, self.appointment_time, self.created_at)
    }

    /// Merge the fields present in `patch`. Returns true when anything changed.
    pub fn apply(&mut self, patch: &EntryPatch) -> bool {
        let before = self.clone();
        if let Some(v) = &patch.resident_name {
            self.resident_name = v.clone();
        }
        if let Some(v) = &patch.faculty_name {
            self.faculty_name = v.clone();
        }
        if let Some(v) = patch.day {
            self.day = v;
        }
        if let Some(v) = patch.clinic_time {
            self.clinic_time = v;
        }
        if let Some(v) = patch.appointment_time {
            self.appointment_time = v;
        }
        if let Some(v) = &patch.patient_name {
            self.patient_name = v.clone();
        }
        if let Some(v) = &patch.clinic_number {
            self.clinic_number = v.clone();
        }
        if let Some(v) = &patch.notes {
            self.notes = Some(v.clone());
        }
        if let Some(v) = patch.arrived {
            self.arrived = v;
        }
        if let Some(v) = patch.seen {
            self.seen = v;
        }
        *self != before
    }
}

/// Sort into canonical slot order. Stable, so equal keys keep their order.
pub fn sort_entries(entries: &mut [ScheduleEntry]) {
    entries.sort_by(|a, b| a.slot_key().cmp(&b.slot_key()));
}

/// Check the canonical order invariant
pub fn is_sorted(entries: &[ScheduleEntry]) -> bool {
    entries.windows(2).all(|w| w[0].slot_key() <= w[1].slot_key())
}

/// Resident submission: entry fields minus id, flags and creation time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    pub resident_name: String,
    pub faculty_name: String,
    pub day: Day,
    pub clinic_time: ClinicTime,
    pub appointment_time: AppointmentTime,
    pub patient_name: String,
    pub clinic_number: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewEntry {
    /// Reject blank required fields before anything is written
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("residentName", &self.resident_name),
            ("facultyName", &self.faculty_name),
            ("patientName", &self.patient_name),
            ("clinicNumber", &self.clinic_number),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "Please complete all required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Blank notes are stored as absent
    pub fn normalized_notes(&self) -> Option<String> {
        self.notes
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
    }
}

/// Partial update keyed by entry id; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resident_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faculty_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<Day>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_time: Option<ClinicTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<AppointmentTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrived: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seen: Option<bool>,
}

impl EntryPatch {
    pub fn arrived(value: bool) -> Self {
        Self {
            arrived: Some(value),
            ..Default::default()
        }
    }

    pub fn seen(value: bool) -> Self {
        Self {
            seen: Some(value),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// View query. Exact string equality per field; absent or empty fields
/// match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleFilter {
    #[serde(default)]
    pub resident_name: Option<String>,
    #[serde(default)]
    pub faculty_name: Option<String>,
    #[serde(default)]
    pub day: Option<Day>,
    #[serde(default)]
    pub clinic_time: Option<ClinicTime>,
    /// Case-insensitive patient name substring, applied after the exact fields
    #[serde(default)]
    pub patient_search: Option<String>,
}

impl ScheduleFilter {
    pub fn faculty(name: impl Into<String>) -> Self {
        Self {
            faculty_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn resident(name: impl Into<String>) -> Self {
        Self {
            resident_name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_day(mut self, day: Day) -> Self {
        self.day = Some(day);
        self
    }

    pub fn with_clinic_time(mut self, clinic_time: ClinicTime) -> Self {
        self.clinic_time = Some(clinic_time);
        self
    }

    pub fn matches(&self, entry: &ScheduleEntry) -> bool {
        fn text_matches(wanted: &Option<String>, actual: &str) -> bool {
            match wanted.as_deref() {
                None | Some("") => true,
                Some(w) => w == actual,
            }
        }

        if !text_matches(&self.resident_name, &entry.resident_name) {
            return false;
        }
        if !text_matches(&self.faculty_name, &entry.faculty_name) {
            return false;
        }
        if self.day.is_some_and(|d| d != entry.day) {
            return false;
        }
        if self.clinic_time.is_some_and(|c| c != entry.clinic_time) {
            return false;
        }
        match self.patient_search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => entry
                .patient_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
        }
    }
}

/// Default resident roster offered by the submission form
pub const RESIDENTS: [&str; 3] = ["Resident A", "Resident B", "Resident C"];

/// Default faculty roster
pub const FACULTY: [&str; 3] = ["Dr. Ahmed", "Dr. Sara", "Dr. Omar"];

/// Bookable appointment times, 30 minute grid around the midday break
pub const APPOINTMENT_TIMES: [&str; 12] = [
    "09:00", "09:30", "10:00", "10:30", "11:00", "11:30", "13:00", "13:30", "14:00", "14:30",
    "15:00", "15:30",
];
