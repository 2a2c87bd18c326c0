//! Integration tests for clinic-portal HTTP endpoints
//!
//! Tests cover:
//! - Health endpoint (no session required)
//! - Route gate: 401 without session, 403 with the wrong role, admin override
//! - Submission, validation and persistence failures
//! - Flag toggles and background write status
//! - Filtered listing
//! - Access checks for view paths and inline links

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use clinic_portal::mirror::MemoryMirror;
use clinic_portal::persistence::InMemoryRepository;
use clinic_portal::realtime::RealtimeHub;
use clinic_portal::store::ScheduleStore;
use clinic_portal::{build_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt; // for `oneshot` method

/// Test helper: app over an in-memory repository
fn setup_app() -> (Router, Arc<InMemoryRepository>, Arc<ScheduleStore>) {
    let repo = Arc::new(InMemoryRepository::new());
    let store = Arc::new(ScheduleStore::new(
        repo.clone(),
        RealtimeHub::new(64),
        Arc::new(MemoryMirror::new()),
    ));
    let app = build_router(AppState::new(store.clone()));
    (app, repo, store)
}

/// Test helper: request with optional viewer headers
fn request(method: &str, uri: &str, viewer: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, roles)) = viewer {
        builder = builder
            .header("x-clinic-user", user)
            .header("x-clinic-roles", roles);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Test helper: Extract JSON body from response
async fn extract_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

const RESIDENT: Option<(&str, &str)> = Some(("Resident A", "resident"));
const SARA: Option<(&str, &str)> = Some(("Dr. Sara", "faculty"));

fn ali() -> Value {
    json!({
        "residentName": "Resident A",
        "facultyName": "Dr. Sara",
        "day": "Monday",
        "clinicTime": "AM",
        "appointmentTime": "09:00",
        "patientName": "Ali",
        "clinicNumber": "C-12",
        "notes": "follow-up"
    })
}

async fn submit(app: &Router, body: Value) -> Value {
    let response = app
        .clone()
        .oneshot(request("POST", "/api/schedule", RESIDENT, Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    extract_json(response.into_body()).await
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint_no_auth_required() {
    let (app, _, _) = setup_app();
    let response = app.oneshot(request("GET", "/health", None, None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "clinic-portal");
    assert_eq!(body["entries"], 0);
}

// =============================================================================
// Route gate
// =============================================================================

#[tokio::test]
async fn test_schedule_requires_session() {
    let (app, _, _) = setup_app();
    let response = app
        .oneshot(request("GET", "/api/schedule", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["redirect"], "/auth");
}

#[tokio::test]
async fn test_wrong_role_is_forbidden() {
    let (app, _, _) = setup_app();
    // Faculty cannot submit entries
    let response = app
        .oneshot(request("POST", "/api/schedule", SARA, Some(ali())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["redirect"], "/");
}

#[tokio::test]
async fn test_admin_passes_every_gate() {
    let (app, _, _) = setup_app();
    let admin = Some(("Program Office", "admin"));
    let response = app
        .clone()
        .oneshot(request("POST", "/api/schedule", admin, Some(ali())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(request("GET", "/api/schedule", admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_rosters_need_only_a_session() {
    let (app, _, _) = setup_app();
    let response = app
        .clone()
        .oneshot(request("GET", "/api/rosters", Some(("Guest", "")), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["faculty"], json!(["Dr. Ahmed", "Dr. Sara", "Dr. Omar"]));
    assert_eq!(body["days"][0], "Sunday");
    assert_eq!(body["appointmentTimes"].as_array().unwrap().len(), 12);

    let response = app
        .oneshot(request("GET", "/api/rosters", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Submission
// =============================================================================

#[tokio::test]
async fn test_submit_and_list() {
    let (app, repo, _) = setup_app();
    let created = submit(&app, ali()).await;
    assert!(created["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(created["arrived"], false);
    assert_eq!(created["notes"], "follow-up");

    let response = app
        .oneshot(request(
            "GET",
            "/api/schedule?facultyName=Dr.%20Sara&day=Monday&clinicTime=AM",
            SARA,
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rows = extract_json(response.into_body()).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["patientName"], "Ali");
    assert_eq!(repo.rows().await.len(), 1);
}

#[tokio::test]
async fn test_submit_missing_fields_is_422() {
    let (app, repo, _) = setup_app();
    let mut body = ali();
    body["patientName"] = json!("  ");
    let response = app
        .oneshot(request("POST", "/api/schedule", RESIDENT, Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = extract_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("patientName"));
    assert!(repo.rows().await.is_empty());
}

#[tokio::test]
async fn test_submit_when_store_unreachable_is_503() {
    let (app, repo, store) = setup_app();
    repo.set_fail_writes(true);
    let response = app
        .oneshot(request("POST", "/api/schedule", RESIDENT, Some(ali())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_list_filters_ignore_empty_values_and_search() {
    let (app, _, _) = setup_app();
    submit(&app, ali()).await;
    let mut other = ali();
    other["patientName"] = json!("Noura");
    other["facultyName"] = json!("Dr. Omar");
    submit(&app, other).await;

    let response = app
        .clone()
        .oneshot(request("GET", "/api/schedule?facultyName=&day=&search=NOU", RESIDENT, None))
        .await
        .unwrap();
    let rows = extract_json(response.into_body()).await;
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["patientName"], "Noura");

    let response = app
        .oneshot(request("GET", "/api/schedule?day=Friday", RESIDENT, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Toggles
// =============================================================================

#[tokio::test]
async fn test_toggle_arrived_and_seen() {
    let (app, repo, store) = setup_app();
    let created = submit(&app, ali()).await;
    let id = created["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/schedule/{}/arrived", id),
            RESIDENT,
            Some(json!({"value": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(store.entries().await[0].arrived);

    // Residents cannot mark seen
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/schedule/{}/seen", id),
            RESIDENT,
            Some(json!({"value": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            &format!("/api/schedule/{}/seen", id),
            SARA,
            Some(json!({"value": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Background writes settle
    let mut status = Value::Null;
    for _ in 0..100 {
        let response = app
            .clone()
            .oneshot(request("GET", &format!("/api/schedule/{}/status", id), SARA, None))
            .await
            .unwrap();
        status = extract_json(response.into_body()).await;
        if status["arrived"]["state"] == "confirmed" && status["seen"]["state"] == "confirmed" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status["arrived"]["state"], "confirmed");
    assert_eq!(status["seen"]["state"], "confirmed");
    let rows = repo.rows().await;
    assert!(rows[0].arrived && rows[0].seen);
}

#[tokio::test]
async fn test_toggle_unknown_entry_is_404() {
    let (app, repo, _) = setup_app();
    let response = app
        .oneshot(request(
            "POST",
            "/api/schedule/ghost/arrived",
            RESIDENT,
            Some(json!({"value": true})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(repo.update_calls(), 0);
}

// =============================================================================
// Broadcast ingress
// =============================================================================

fn peer_entry(id: &str) -> Value {
    json!({
        "id": id,
        "residentName": "Resident B",
        "facultyName": "Dr. Omar",
        "day": "Tuesday",
        "clinicTime": "PM",
        "appointmentTime": "13:00",
        "patientName": "Huda",
        "clinicNumber": "C-4",
        "arrived": false,
        "seen": false,
        "createdAt": chrono::Utc::now().to_rfc3339()
    })
}

#[tokio::test]
async fn test_broadcast_from_peer_reaches_the_store() {
    let (app, _, store) = setup_app();
    let _sync = store.attach_realtime().unwrap();

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/broadcast/schedule",
            RESIDENT,
            Some(json!({"event": "entry_added", "payload": peer_entry("peer-1")})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["delivered"], 1);

    for _ in 0..100 {
        if !store.is_empty().await {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let entries = store.entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "peer-1");
}

#[tokio::test]
async fn test_broadcast_rejects_untyped_payloads() {
    let (app, _, _) = setup_app();

    // Missing required fields
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/broadcast/arrivals",
            SARA,
            Some(json!({"event": "arrival", "payload": {"facultyName": "Dr. Sara"}})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Right payload, wrong channel
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/broadcast/arrivals",
            RESIDENT,
            Some(json!({"event": "entry_added", "payload": peer_entry("peer-2")})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/broadcast/lobby",
            RESIDENT,
            Some(json!({"event": "entry_added", "payload": peer_entry("peer-3")})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Read-only viewers cannot publish
    let response = app
        .oneshot(request(
            "POST",
            "/api/broadcast/schedule",
            Some(("Dr. Noor", "program_director")),
            Some(json!({"event": "entry_added", "payload": peer_entry("peer-4")})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

// =============================================================================
// Access checks
// =============================================================================

#[tokio::test]
async fn test_access_check_for_view_paths() {
    let (app, _, _) = setup_app();

    let response = app
        .clone()
        .oneshot(request("GET", "/api/access?path=/faculty", None, None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "unauthenticated");
    assert_eq!(body["redirect"], "/auth");
    assert_eq!(
        body["linkMessage"],
        "You do not have permission to access this section. Please sign in."
    );

    let response = app
        .clone()
        .oneshot(request(
            "GET",
            "/api/access?path=/faculty/schedule&label=the%20faculty%20view",
            RESIDENT,
            None,
        ))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "unauthorized");
    assert_eq!(body["redirect"], "/");
    assert!(body["linkMessage"].as_str().unwrap().contains("the faculty view"));

    let response = app
        .clone()
        .oneshot(request("GET", "/api/access?path=/faculty", SARA, None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "authorized");
    assert!(body.get("redirect").is_none());
    assert!(body.get("linkMessage").is_none());

    let response = app
        .oneshot(request("GET", "/api/access?path=/profile", Some(("Guest", "")), None))
        .await
        .unwrap();
    let body = extract_json(response.into_body()).await;
    assert_eq!(body["state"], "authorized");
}
