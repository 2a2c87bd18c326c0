//! clinic-portal library
//!
//! Schedule store, arrival notifier and the HTTP surface the views talk to.

use axum::Router;
use std::sync::Arc;

pub mod api;
pub mod mirror;
pub mod notifier;
pub mod persistence;
pub mod realtime;
pub mod reset;
pub mod store;
pub mod task;

use notifier::ToneSpec;
use realtime::RealtimeHub;
use store::ScheduleStore;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ScheduleStore>,
    pub hub: RealtimeHub,
    /// Tone announced to alert streams
    pub tone: ToneSpec,
}

impl AppState {
    pub fn new(store: Arc<ScheduleStore>) -> Self {
        let hub = store.hub().clone();
        Self {
            store,
            hub,
            tone: ToneSpec::ARRIVAL,
        }
    }
}

/// Build application router
///
/// `/health` is public; every `/api` route passes the access guard first.
pub fn build_router(state: AppState) -> Router {
    use api::auth::require_roles;
    use axum::middleware::from_fn_with_state;
    use axum::routing::{get, post};
    use clinic_common::identity::{FACULTY, PROGRAM_DIRECTOR, RESIDENT};

    const VIEWERS: &[&str] = &[RESIDENT, FACULTY, PROGRAM_DIRECTOR];
    const RESIDENTS: &[&str] = &[RESIDENT];
    const FACULTY_ONLY: &[&str] = &[FACULTY];
    const ALERTED: &[&str] = &[FACULTY, RESIDENT];
    const WRITERS: &[&str] = &[RESIDENT, FACULTY];
    const SIGNED_IN: &[&str] = &[];

    let schedule = get(api::schedule::list_entries)
        .route_layer(from_fn_with_state(VIEWERS, require_roles))
        .merge(
            post(api::schedule::add_entry).route_layer(from_fn_with_state(RESIDENTS, require_roles)),
        );

    let protected = Router::new()
        .route("/api/schedule", schedule)
        .route(
            "/api/schedule/:id/arrived",
            post(api::schedule::set_arrived).route_layer(from_fn_with_state(RESIDENTS, require_roles)),
        )
        .route(
            "/api/schedule/:id/seen",
            post(api::schedule::set_seen).route_layer(from_fn_with_state(FACULTY_ONLY, require_roles)),
        )
        .route(
            "/api/schedule/:id/status",
            get(api::schedule::write_status).route_layer(from_fn_with_state(VIEWERS, require_roles)),
        )
        .route(
            "/api/events",
            get(api::sse::schedule_events).route_layer(from_fn_with_state(VIEWERS, require_roles)),
        )
        .route(
            "/api/alerts",
            get(api::sse::arrival_alerts).route_layer(from_fn_with_state(ALERTED, require_roles)),
        )
        .route(
            "/api/broadcast/:channel",
            post(api::broadcast::publish).route_layer(from_fn_with_state(WRITERS, require_roles)),
        )
        .route(
            "/api/rosters",
            get(api::schedule::rosters).route_layer(from_fn_with_state(SIGNED_IN, require_roles)),
        );

    // Public routes (no authentication)
    let public = Router::new()
        .route("/api/access", get(api::auth::check_access))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .with_state(state)
}
