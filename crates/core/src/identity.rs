use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{RequesterId, RequesterRole};
use crate::errors::ValidationError;

/// Role of an authenticated caller, as asserted by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Student,
    Staff,
    Hod,
    Admin,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Staff => "staff",
            Self::Hod => "hod",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "staff" => Ok(Self::Staff),
            "hod" => Ok(Self::Hod),
            "admin" => Ok(Self::Admin),
            other => Err(ValidationError::InvalidActorRole { role: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    ListOwn,
    ListStaffPending,
    StaffDecide,
    ListHodPending,
    HodDecide,
    Report,
}

impl Operation {
    pub fn allowed_roles(&self) -> &'static [ActorRole] {
        match self {
            Self::ListOwn => &[ActorRole::Student, ActorRole::Staff],
            Self::ListStaffPending | Self::StaffDecide => &[ActorRole::Staff],
            Self::ListHodPending | Self::HodDecide => &[ActorRole::Hod],
            Self::Report => &[ActorRole::Admin],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListOwn => "list_own",
            Self::ListStaffPending => "list_staff_pending",
            Self::StaffDecide => "staff_decide",
            Self::ListHodPending => "list_hod_pending",
            Self::HodDecide => "hod_decide",
            Self::Report => "report",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("access denied for {}: required role {}, caller role {actual}", .operation.as_str(), required_roles(.operation))]
pub struct AuthorizationError {
    pub operation: Operation,
    pub actual: ActorRole,
}

fn required_roles(operation: &Operation) -> String {
    operation.allowed_roles().iter().map(ActorRole::as_str).collect::<Vec<_>>().join(" or ")
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: RequesterId,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: impl Into<String>, role: ActorRole) -> Self {
        Self { id: RequesterId(id.into()), role }
    }

    pub fn authorize(&self, operation: Operation) -> Result<(), AuthorizationError> {
        if operation.allowed_roles().contains(&self.role) {
            Ok(())
        } else {
            Err(AuthorizationError { operation, actual: self.role })
        }
    }

    /// Requester track for callers that may submit; `None` for HOD and admin.
    pub fn requester_role(&self) -> Option<RequesterRole> {
        match self.role {
            ActorRole::Student => Some(RequesterRole::Student),
            ActorRole::Staff => Some(RequesterRole::Staff),
            ActorRole::Hod | ActorRole::Admin => None,
        }
    }
}
