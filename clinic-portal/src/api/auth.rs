//! Identity headers and the route gate
//!
//! Sessions are issued upstream; the fronting proxy forwards the viewer as
//! `x-clinic-user` (display identity) and `x-clinic-roles` (comma separated).
//! Every guarded route is re-evaluated per request through
//! [`clinic_common::access`].

use axum::{
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use clinic_common::access::{
    evaluate_link, evaluate_route, required_roles_for, GateDecision, GateState, LinkOutcome,
};
use clinic_common::identity::{Identity, IdentityState, RoleSet, Session, UserMetadata};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

pub const USER_HEADER: &str = "x-clinic-user";
pub const ROLES_HEADER: &str = "x-clinic-roles";

/// Identity carried by a request; anonymous without a user header
pub fn identity_from_headers(headers: &HeaderMap) -> Identity {
    let user = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let Some(user) = user else {
        return Identity::anonymous();
    };

    let roles: Vec<String> = headers
        .get(ROLES_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(RoleSet::parse_list)
        .map(|set| set.iter().map(str::to_string).collect())
        .unwrap_or_default();

    let session = Session {
        user_id: user.to_string(),
        email: None,
        metadata: UserMetadata {
            display_name: Some(user.to_string()),
            ..Default::default()
        },
    };
    Identity::signed_in(session, Some(roles))
}

/// Route gate middleware
///
/// State is the list of roles the route requires (empty: any session).
/// On success the resolved [`Identity`] is attached as a request extension.
pub async fn require_roles(
    State(required): State<&'static [&'static str]>,
    mut request: Request,
    next: Next,
) -> Response {
    let identity = identity_from_headers(request.headers());
    let state = IdentityState::Resolved(identity.clone());

    match evaluate_route(&state, required).decision() {
        GateDecision::Render => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        GateDecision::Redirect(to) => {
            let status = if identity.is_authenticated() {
                StatusCode::FORBIDDEN
            } else {
                StatusCode::UNAUTHORIZED
            };
            debug!("Gate denied {} ({}), redirect {}", request.uri().path(), status, to);
            let message = if identity.is_authenticated() {
                "You do not have permission to access this section."
            } else {
                "Please sign in."
            };
            (status, Json(json!({ "error": message, "redirect": to }))).into_response()
        }
        GateDecision::Wait => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub path: String,
    /// Label for the denial message of an inline link
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessResponse {
    pub path: String,
    pub state: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
    /// Explanation to show when the path is followed from an inline link
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link_message: Option<String>,
}

/// GET /api/access?path=/faculty&label=...
///
/// Lets the view layer ask how a route gate or link gate resolves for the
/// current viewer. Paths outside the route table are public.
pub async fn check_access(headers: HeaderMap, Query(query): Query<AccessQuery>) -> Json<AccessResponse> {
    let identity = identity_from_headers(&headers);
    let required = required_roles_for(&query.path).unwrap_or(&[]);
    let public = required_roles_for(&query.path).is_none();

    let gate = if public {
        GateState::Authorized
    } else {
        evaluate_route(&IdentityState::Resolved(identity.clone()), required)
    };
    let redirect = match gate.decision() {
        GateDecision::Redirect(to) => Some(to),
        _ => None,
    };
    let link_message = match evaluate_link(&identity.roles, required, query.label.as_deref()) {
        LinkOutcome::Follow => None,
        LinkOutcome::ExplainDenied { message } => Some(message),
    };

    Json(AccessResponse {
        path: query.path,
        state: gate_name(gate),
        redirect,
        link_message,
    })
}

fn gate_name(state: GateState) -> &'static str {
    match state {
        GateState::Loading => "loading",
        GateState::Unauthenticated => "unauthenticated",
        GateState::Authorized => "authorized",
        GateState::Unauthorized => "unauthorized",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_identity_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(!identity_from_headers(&headers).is_authenticated());

        headers.insert(USER_HEADER, HeaderValue::from_static(" Dr. Sara "));
        headers.insert(ROLES_HEADER, HeaderValue::from_static("faculty, program_director"));
        let identity = identity_from_headers(&headers);
        assert_eq!(identity.display_identity().as_deref(), Some("Dr. Sara"));
        assert!(identity.roles.contains("faculty"));
        assert!(identity.roles.contains("program_director"));
    }

    #[test]
    fn test_blank_user_header_is_anonymous() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_HEADER, HeaderValue::from_static("   "));
        headers.insert(ROLES_HEADER, HeaderValue::from_static("admin"));
        let identity = identity_from_headers(&headers);
        assert!(!identity.is_authenticated());
        assert!(identity.roles.is_empty());
    }
}
