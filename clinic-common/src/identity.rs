//! Viewer identity and role context
//!
//! Sessions are issued by the external auth provider. This module only folds
//! what the provider hands back into a role set and a display identity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const RESIDENT: &str = "resident";
pub const FACULTY: &str = "faculty";
pub const PROGRAM_DIRECTOR: &str = "program_director";
pub const ADMIN: &str = "admin";

/// Open-ended set of role names
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    pub fn is_admin(&self) -> bool {
        self.contains(ADMIN)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Parse a comma separated header value such as `"resident, faculty"`
    pub fn parse_list(raw: &str) -> Self {
        raw.split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Role claim in user metadata: either a list or a single role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleClaim {
    Many(Vec<String>),
    One(String),
}

/// Profile metadata attached to a session by the auth provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMetadata {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Option<RoleClaim>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Active session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub metadata: UserMetadata,
}

impl Session {
    /// Name used to match arrival alerts: display_name, full_name, name, then email
    pub fn display_identity(&self) -> Option<String> {
        [
            self.metadata.display_name.as_deref(),
            self.metadata.full_name.as_deref(),
            self.metadata.name.as_deref(),
            self.email.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
    }

    /// Roles carried in the session metadata (`roles` wins over `role`)
    pub fn metadata_roles(&self) -> RoleSet {
        match (&self.metadata.roles, &self.metadata.role) {
            (Some(RoleClaim::Many(list)), _) => list.iter().cloned().collect(),
            (Some(RoleClaim::One(one)), _) => std::iter::once(one.clone()).collect(),
            (None, Some(one)) => std::iter::once(one.clone()).collect(),
            (None, None) => RoleSet::empty(),
        }
    }
}

/// Resolved identity: possibly no session, plus the roles derived for it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub session: Option<Session>,
    pub roles: RoleSet,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Identity for a signed-in user. Roles from the role table replace the
    /// metadata roles when the lookup returned any.
    pub fn signed_in(session: Session, table_roles: Option<Vec<String>>) -> Self {
        let roles = match table_roles {
            Some(rows) if !rows.is_empty() => rows.into_iter().collect(),
            _ => session.metadata_roles(),
        };
        Self {
            session: Some(session),
            roles,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    pub fn display_identity(&self) -> Option<String> {
        self.session.as_ref().and_then(Session::display_identity)
    }
}

/// Identity lifecycle as seen by guards and the arrival notifier
#[derive(Debug, Clone, PartialEq)]
pub enum IdentityState {
    /// Session known or not, roles not yet loaded
    Loading,
    Resolved(Identity),
}

impl IdentityState {
    pub fn is_loading(&self) -> bool {
        matches!(self, IdentityState::Loading)
    }

    pub fn identity(&self) -> Option<&Identity> {
        match self {
            IdentityState::Loading => None,
            IdentityState::Resolved(identity) => Some(identity),
        }
    }

    /// Display identity, only once resolution has completed
    pub fn display_identity(&self) -> Option<String> {
        self.identity().and_then(Identity::display_identity)
    }

    /// Sign-out clears session and roles
    pub fn sign_out(&mut self) {
        *self = IdentityState::Resolved(Identity::anonymous());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(metadata: UserMetadata, email: Option<&str>) -> Session {
        Session {
            user_id: "u-1".to_string(),
            email: email.map(str::to_string),
            metadata,
        }
    }

    #[test]
    fn test_display_identity_precedence() {
        let s = session(
            UserMetadata {
                full_name: Some("Dr. Sara Khalid".to_string()),
                name: Some("sara".to_string()),
                ..Default::default()
            },
            Some("sara@example.org"),
        );
        assert_eq!(s.display_identity().as_deref(), Some("Dr. Sara Khalid"));

        let s = session(
            UserMetadata {
                display_name: Some("  ".to_string()),
                ..Default::default()
            },
            Some("sara@example.org"),
        );
        assert_eq!(s.display_identity().as_deref(), Some("sara@example.org"));

        let s = session(UserMetadata::default(), None);
        assert_eq!(s.display_identity(), None);
    }

    #[test]
    fn test_metadata_roles_list_or_single() {
        let json = r#"{"user_id":"u","metadata":{"roles":["resident","faculty"]}}"#;
        let s: Session = serde_json::from_str(json).unwrap();
        let roles = s.metadata_roles();
        assert!(roles.contains("resident") && roles.contains("faculty"));

        let json = r#"{"user_id":"u","metadata":{"roles":"admin"}}"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert!(s.metadata_roles().is_admin());

        let json = r#"{"user_id":"u","metadata":{"role":"faculty"}}"#;
        let s: Session = serde_json::from_str(json).unwrap();
        assert!(s.metadata_roles().contains(FACULTY));
    }

    #[test]
    fn test_table_roles_replace_metadata_roles() {
        let s = session(
            UserMetadata {
                role: Some("resident".to_string()),
                ..Default::default()
            },
            None,
        );
        let identity = Identity::signed_in(s.clone(), Some(vec!["faculty".to_string()]));
        assert!(identity.roles.contains(FACULTY));
        assert!(!identity.roles.contains(RESIDENT));

        let identity = Identity::signed_in(s, Some(vec![]));
        assert!(identity.roles.contains(RESIDENT));
    }

    #[test]
    fn test_parse_role_header() {
        let roles = RoleSet::parse_list(" resident, ,program_director ");
        assert!(roles.contains(RESIDENT));
        assert!(roles.contains(PROGRAM_DIRECTOR));
        assert_eq!(roles.iter().count(), 2);
    }

    #[test]
    fn test_loading_has_no_display_identity_and_sign_out_clears() {
        let mut state = IdentityState::Loading;
        assert!(state.display_identity().is_none());

        let s = session(
            UserMetadata {
                display_name: Some("Dr. Sara".to_string()),
                role: Some("faculty".to_string()),
                ..Default::default()
            },
            None,
        );
        state = IdentityState::Resolved(Identity::signed_in(s, None));
        assert_eq!(state.display_identity().as_deref(), Some("Dr. Sara"));

        state.sign_out();
        let identity = state.identity().unwrap();
        assert!(!identity.is_authenticated());
        assert!(identity.roles.is_empty());
    }
}
