//! Access guard
//!
//! Every role check in the portal goes through [`has_access`]: route gates,
//! inline link gates and menu gates alike. Decisions are recomputed per
//! request and never cached, so a sign-out takes effect immediately.

use crate::identity::{IdentityState, RoleSet, FACULTY, PROGRAM_DIRECTOR, RESIDENT};

/// Where unauthenticated viewers are sent
pub const SIGN_IN_PATH: &str = "/auth";

/// Where authenticated but unauthorized viewers are sent
pub const NEUTRAL_PATH: &str = "/";

/// Role predicate.
///
/// - no required roles: granted
/// - viewer holds `admin`: granted
/// - otherwise: granted iff the sets intersect
pub fn has_access(viewer_roles: &RoleSet, required_roles: &[&str]) -> bool {
    if required_roles.is_empty() || viewer_roles.is_admin() {
        return true;
    }
    required_roles.iter().any(|r| viewer_roles.contains(r))
}

/// Route gate states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Loading,
    Unauthenticated,
    Authorized,
    Unauthorized,
}

/// What the caller should do with a gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Identity still resolving; render nothing yet
    Wait,
    Redirect(&'static str),
    Render,
}

impl GateState {
    pub fn decision(self) -> GateDecision {
        match self {
            GateState::Loading => GateDecision::Wait,
            GateState::Unauthenticated => GateDecision::Redirect(SIGN_IN_PATH),
            GateState::Unauthorized => GateDecision::Redirect(NEUTRAL_PATH),
            GateState::Authorized => GateDecision::Render,
        }
    }
}

/// Evaluate a guarded route for the current identity
pub fn evaluate_route(state: &IdentityState, required_roles: &[&str]) -> GateState {
    let Some(identity) = state.identity() else {
        return GateState::Loading;
    };
    if !identity.is_authenticated() {
        return GateState::Unauthenticated;
    }
    if has_access(&identity.roles, required_roles) {
        GateState::Authorized
    } else {
        GateState::Unauthorized
    }
}

/// Outcome of clicking a guarded inline link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Follow,
    /// Stay on the page and explain why
    ExplainDenied { message: String },
}

/// Link gate: same predicate, but a denial explains itself instead of redirecting
pub fn evaluate_link(viewer_roles: &RoleSet, required_roles: &[&str], label: Option<&str>) -> LinkOutcome {
    if has_access(viewer_roles, required_roles) {
        LinkOutcome::Follow
    } else {
        LinkOutcome::ExplainDenied {
            message: format!(
                "You do not have permission to access {}. Please sign in.",
                label.unwrap_or("this section")
            ),
        }
    }
}

/// Route prefix and the roles it requires
#[derive(Debug, Clone, Copy)]
pub struct RouteRule {
    pub prefix: &'static str,
    pub required_roles: &'static [&'static str],
}

/// Guarded views of the portal. `/profile` only needs a session.
pub const ROUTE_RULES: &[RouteRule] = &[
    RouteRule { prefix: "/resident", required_roles: &[RESIDENT] },
    RouteRule { prefix: "/faculty", required_roles: &[FACULTY] },
    RouteRule { prefix: "/program-director", required_roles: &[PROGRAM_DIRECTOR] },
    RouteRule { prefix: "/profile", required_roles: &[] },
];

/// Roles required for a view path; `None` for public paths
pub fn required_roles_for(path: &str) -> Option<&'static [&'static str]> {
    ROUTE_RULES
        .iter()
        .find(|rule| {
            path == rule.prefix
                || path
                    .strip_prefix(rule.prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        })
        .map(|rule| rule.required_roles)
}
