//! Session identity resolution.
//!
//! Decides which subject a monitoring session concerns. A self-monitoring
//! user is always their own subject; a supervising user (doctor) acts on
//! behalf of a selected patient and must pick one before monitoring starts.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::session::SessionError;

/// Identifier of a person known to the backend (patient, doctor, admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u64);

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SubjectId {
    fn from(id: u64) -> Self {
        SubjectId(id)
    }
}

/// Role carried on the authenticated subject record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    #[default]
    Patient,
}

impl Role {
    /// Role name the sensor gateway expects in the identify command.
    ///
    /// The gateway only distinguishes doctors; everyone else identifies as a
    /// patient.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Admin | Role::Patient => "paciente",
        }
    }
}

/// Cached subject record of the authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: Option<SubjectId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub lastname: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

impl User {
    /// Display name for headers ("Ana Pérez", or the email when unnamed).
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.name, self.lastname);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }
}

/// Who a session monitors, resolved once from the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitoringMode {
    /// The user watches their own vital signs.
    SelfMonitoring { subject: SubjectId },
    /// A doctor watches a selected patient.
    Supervising {
        supervisor: SubjectId,
        selected: Option<SubjectId>,
    },
}

impl MonitoringMode {
    /// Resolve the monitoring mode for an authenticated user.
    ///
    /// Fails with [`SessionError::Unauthenticated`] when the user record has
    /// no identifier.
    pub fn for_user(user: &User) -> Result<Self, SessionError> {
        let id = user.id.ok_or(SessionError::Unauthenticated)?;
        Ok(match user.role {
            Role::Doctor => MonitoringMode::Supervising {
                supervisor: id,
                selected: None,
            },
            Role::Admin | Role::Patient => MonitoringMode::SelfMonitoring { subject: id },
        })
    }

    /// Whether this session acts on behalf of someone else.
    pub fn is_supervising(&self) -> bool {
        matches!(self, MonitoringMode::Supervising { .. })
    }

    /// The acting user's own identifier.
    pub fn acting_user(&self) -> SubjectId {
        match self {
            MonitoringMode::SelfMonitoring { subject } => *subject,
            MonitoringMode::Supervising { supervisor, .. } => *supervisor,
        }
    }

    /// The subject messages and commands are addressed to, if resolved.
    pub fn resolve_target_subject(&self) -> Option<SubjectId> {
        match self {
            MonitoringMode::SelfMonitoring { subject } => Some(*subject),
            MonitoringMode::Supervising { selected, .. } => *selected,
        }
    }

    /// The target subject, or [`SessionError::SelectionRequired`] when a
    /// supervising user has not picked a patient yet.
    pub fn required_before_start(&self) -> Result<SubjectId, SessionError> {
        self.resolve_target_subject().ok_or(SessionError::SelectionRequired)
    }

    /// Change the selected subject.
    ///
    /// Returns `true` when the selection actually changed. Self-monitoring
    /// sessions have no selection and always return `false`.
    pub fn select(&mut self, subject: Option<SubjectId>) -> bool {
        match self {
            MonitoringMode::SelfMonitoring { .. } => false,
            MonitoringMode::Supervising { selected, .. } => {
                if *selected == subject {
                    false
                } else {
                    *selected = subject;
                    true
                }
            }
        }
    }

    /// Addressing rule for inbound traffic.
    ///
    /// A message is for this session when its subject is the target, or when
    /// a supervising user is named as the message's supervisor (regardless of
    /// which patient it concerns).
    pub fn accepts(&self, subject: Option<SubjectId>, supervisor: Option<SubjectId>) -> bool {
        match self {
            MonitoringMode::SelfMonitoring { subject: own } => subject == Some(*own),
            MonitoringMode::Supervising {
                supervisor: own,
                selected,
            } => (selected.is_some() && subject == *selected) || supervisor == Some(*own),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: Option<u64>, role: Role) -> User {
        User {
            id: id.map(SubjectId),
            name: "Ana".to_string(),
            lastname: "Pérez".to_string(),
            email: "ana@example.com".to_string(),
            role,
            access_token: None,
        }
    }

    #[test]
    fn patient_monitors_self() {
        let mode = MonitoringMode::for_user(&user(Some(7), Role::Patient)).unwrap();
        assert!(!mode.is_supervising());
        assert_eq!(mode.resolve_target_subject(), Some(SubjectId(7)));
        assert_eq!(mode.required_before_start().unwrap(), SubjectId(7));
    }

    #[test]
    fn admin_is_treated_as_self_monitoring() {
        let mode = MonitoringMode::for_user(&user(Some(1), Role::Admin)).unwrap();
        assert_eq!(mode, MonitoringMode::SelfMonitoring { subject: SubjectId(1) });
        assert_eq!(Role::Admin.wire_name(), "paciente");
    }

    #[test]
    fn doctor_requires_selection() {
        let mode = MonitoringMode::for_user(&user(Some(3), Role::Doctor)).unwrap();
        assert!(mode.is_supervising());
        assert_eq!(mode.resolve_target_subject(), None);
        assert!(matches!(
            mode.required_before_start(),
            Err(SessionError::SelectionRequired)
        ));
    }

    #[test]
    fn missing_id_is_unauthenticated() {
        let result = MonitoringMode::for_user(&user(None, Role::Patient));
        assert!(matches!(result, Err(SessionError::Unauthenticated)));
    }

    #[test]
    fn select_reports_changes_only() {
        let mut mode = MonitoringMode::for_user(&user(Some(3), Role::Doctor)).unwrap();
        assert!(mode.select(Some(SubjectId(7))));
        assert!(!mode.select(Some(SubjectId(7))));
        assert!(mode.select(None));

        let mut own = MonitoringMode::for_user(&user(Some(7), Role::Patient)).unwrap();
        assert!(!own.select(Some(SubjectId(8))));
        assert_eq!(own.resolve_target_subject(), Some(SubjectId(7)));
    }

    #[test]
    fn supervising_accepts_target_or_own_supervisor_id() {
        let mut mode = MonitoringMode::for_user(&user(Some(3), Role::Doctor)).unwrap();
        mode.select(Some(SubjectId(7)));

        assert!(mode.accepts(Some(SubjectId(7)), None));
        assert!(!mode.accepts(Some(SubjectId(8)), None));
        assert!(!mode.accepts(Some(SubjectId(8)), Some(SubjectId(4))));
        // Any patient addressed with this doctor as supervisor is accepted.
        assert!(mode.accepts(Some(SubjectId(8)), Some(SubjectId(3))));
    }

    #[test]
    fn unselected_supervisor_does_not_match_missing_subject() {
        let mode = MonitoringMode::for_user(&user(Some(3), Role::Doctor)).unwrap();
        assert!(!mode.accepts(None, None));
    }

    #[test]
    fn user_record_deserializes_from_backend_shape() {
        let json = r#"{
            "id": 12,
            "access_token": "abc",
            "name": "Luis",
            "lastname": "Gómez",
            "email": "luis@example.com",
            "password": "ignored",
            "profile_picture": null,
            "role": "doctor"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, Some(SubjectId(12)));
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.access_token.as_deref(), Some("abc"));
        assert_eq!(user.display_name(), "Luis Gómez");
    }
}
