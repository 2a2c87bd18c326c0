//! Schedule endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use clinic_common::identity::Identity;
use clinic_common::model::{
    ClinicTime, Day, NewEntry, ScheduleEntry, ScheduleFilter, APPOINTMENT_TIMES, FACULTY, RESIDENTS,
};
use clinic_common::Error;
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::store::EntryWriteStatus;
use crate::AppState;

/// Query string of GET /api/schedule. Empty values mean "any".
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub resident_name: Option<String>,
    pub faculty_name: Option<String>,
    pub day: Option<String>,
    pub clinic_time: Option<String>,
    /// Patient name substring, case-insensitive
    pub search: Option<String>,
}

impl TryFrom<ScheduleQuery> for ScheduleFilter {
    type Error = Error;

    fn try_from(q: ScheduleQuery) -> Result<Self, Error> {
        fn non_empty(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.trim().is_empty())
        }

        Ok(ScheduleFilter {
            resident_name: non_empty(q.resident_name),
            faculty_name: non_empty(q.faculty_name),
            day: non_empty(q.day).map(|d| d.parse::<Day>()).transpose()?,
            clinic_time: non_empty(q.clinic_time).map(|c| c.parse::<ClinicTime>()).transpose()?,
            patient_search: non_empty(q.search),
        })
    }
}

/// GET /api/schedule
pub async fn list_entries(
    State(state): State<AppState>,
    Query(query): Query<ScheduleQuery>,
) -> Result<Json<Vec<ScheduleEntry>>, ApiError> {
    let filter = ScheduleFilter::try_from(query)?;
    Ok(Json(state.store.get_filtered(&filter).await))
}

/// POST /api/schedule
///
/// 201 with the confirmed record; 422 when required fields are blank.
pub async fn add_entry(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(entry): Json<NewEntry>,
) -> Result<(StatusCode, Json<ScheduleEntry>), ApiError> {
    let record = state.store.add_entry(&identity, entry).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[derive(Debug, Deserialize)]
pub struct ToggleRequest {
    pub value: bool,
}

/// POST /api/schedule/:id/arrived
///
/// 202: applied locally, persisted in the background.
pub async fn set_arrived(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Result<StatusCode, ApiError> {
    if state.store.toggle_arrived(&id, body.value).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(Error::NotFound(format!("schedule entry {}", id)).into())
    }
}

/// POST /api/schedule/:id/seen
pub async fn set_seen(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ToggleRequest>,
) -> Result<StatusCode, ApiError> {
    if state.store.toggle_seen(&id, body.value).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(Error::NotFound(format!("schedule entry {}", id)).into())
    }
}

/// GET /api/schedule/:id/status
pub async fn write_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Json<EntryWriteStatus> {
    Json(state.store.write_status(&id))
}

/// Form choices
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rosters {
    pub residents: Vec<&'static str>,
    pub faculty: Vec<&'static str>,
    pub days: Vec<Day>,
    pub clinic_times: Vec<ClinicTime>,
    pub appointment_times: Vec<&'static str>,
}

/// GET /api/rosters
pub async fn rosters() -> Json<Rosters> {
    Json(Rosters {
        residents: RESIDENTS.to_vec(),
        faculty: FACULTY.to_vec(),
        days: Day::ALL.to_vec(),
        clinic_times: ClinicTime::ALL.to_vec(),
        appointment_times: APPOINTMENT_TIMES.to_vec(),
    })
}
