use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Returned when a stored or submitted label does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl fmt::Display for UnknownVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {}: {:?}", self.kind, self.value)
    }
}

impl std::error::Error for UnknownVariant {}

// -- Roles --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Role {
    #[default]
    Consumer,
    Administrator,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Consumer => "Consumer",
            Role::Administrator => "Administrator",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Administrator
    }
}

impl FromStr for Role {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Consumer" => Ok(Role::Consumer),
            "Administrator" => Ok(Role::Administrator),
            other => Err(UnknownVariant { kind: "role", value: other.to_string() }),
        }
    }
}

/// What the Role Manager is asked to do to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleAction {
    Promote,
    Demote,
}

impl RoleAction {
    pub fn target_role(self) -> Role {
        match self {
            RoleAction::Promote => Role::Administrator,
            RoleAction::Demote => Role::Consumer,
        }
    }
}

// -- Requests --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RequestKind {
    #[default]
    Repair,
    Maintenance,
}

impl RequestKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestKind::Repair => "Repair",
            RequestKind::Maintenance => "Maintenance",
        }
    }
}

impl FromStr for RequestKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Repair" => Ok(RequestKind::Repair),
            "Maintenance" => Ok(RequestKind::Maintenance),
            other => Err(UnknownVariant { kind: "request type", value: other.to_string() }),
        }
    }
}

/// Workflow position of a maintenance request.
///
/// ```text
/// Pending Approval ──> Approved ──> In Progress ──> Resolved
///        │                 │
///        └──> Rejected <───┘
/// ```
///
/// `Rejected` and `Resolved` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RequestStatus {
    #[default]
    #[serde(rename = "Pending Approval")]
    PendingApproval,
    Approved,
    Rejected,
    #[serde(rename = "In Progress")]
    InProgress,
    Resolved,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::PendingApproval => "Pending Approval",
            RequestStatus::Approved => "Approved",
            RequestStatus::Rejected => "Rejected",
            RequestStatus::InProgress => "In Progress",
            RequestStatus::Resolved => "Resolved",
        }
    }

    /// Statuses reachable in one step from `self`.
    pub fn successors(self) -> &'static [RequestStatus] {
        use RequestStatus::*;
        match self {
            PendingApproval => &[Approved, Rejected],
            Approved => &[InProgress, Rejected],
            InProgress => &[Resolved],
            Rejected | Resolved => &[],
        }
    }

    pub fn can_transition_to(self, next: RequestStatus) -> bool {
        self.successors().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.successors().is_empty()
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending Approval" => Ok(RequestStatus::PendingApproval),
            "Approved" => Ok(RequestStatus::Approved),
            "Rejected" => Ok(RequestStatus::Rejected),
            "In Progress" => Ok(RequestStatus::InProgress),
            "Resolved" => Ok(RequestStatus::Resolved),
            other => Err(UnknownVariant { kind: "status", value: other.to_string() }),
        }
    }
}

/// A registered user as exposed outside the persistence layer. Hashes never leave the DB crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub security_question: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRequest {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: RequestKind,
    pub title: String,
    pub description: String,
    pub status: RequestStatus,
    pub date_requested: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub requested_by: String,
    pub version: i64,
}

/// Column-level changes to a request. `None` means "leave as is".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestPatch {
    pub kind: Option<RequestKind>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<RequestStatus>,
}

impl RequestPatch {
    /// Keep only the fields whose value differs from `current`.
    pub fn diff_against(self, current: &MaintenanceRequest) -> RequestPatch {
        RequestPatch {
            kind: self.kind.filter(|k| *k != current.kind),
            title: self.title.filter(|t| *t != current.title),
            description: self.description.filter(|d| *d != current.description),
            status: self.status.filter(|s| *s != current.status),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
    }

    /// True when only title and/or description are set.
    pub fn is_content_only(&self) -> bool {
        self.kind.is_none() && self.status.is_none()
    }
}

/// The verified caller of a protected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub email: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}
