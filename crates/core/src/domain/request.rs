use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::errors::{DomainError, ValidationError};

pub const TITLE_MAX_CHARS: usize = 200;
pub const DESCRIPTION_MAX_CHARS: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which approval track a request follows. Fixed at submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Student,
    Staff,
}

impl RequesterRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Staff => "staff",
        }
    }
}

impl FromStr for RequesterRole {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Self::Student),
            "staff" => Ok(Self::Staff),
            other => Err(ValidationError::InvalidRequesterRole { role: other.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Approved,
    Rejected,
}

impl GateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl FromStr for GateStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(ValidationError::InvalidStatus { value: other.to_string() }),
        }
    }
}

/// Outcome a gate-holder may apply. `Pending` is deliberately not representable here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approved,
    Rejected,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        GateStatus::from(*self).as_str()
    }
}

impl From<Decision> for GateStatus {
    fn from(value: Decision) -> Self {
        match value {
            Decision::Approved => GateStatus::Approved,
            Decision::Rejected => GateStatus::Rejected,
        }
    }
}

impl FromStr for Decision {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ValidationError::InvalidDecision { value: value.to_string() }),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Staff,
    Hod,
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Staff => f.write_str("staff"),
            Self::Hod => f.write_str("HOD"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("request has already been processed by {gate}")]
    AlreadyProcessed { gate: Gate },
    #[error("request must be approved by staff first")]
    StaffApprovalRequired,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: RequestId,
    pub requester_id: RequesterId,
    pub requester_role: RequesterRole,
    pub title: String,
    pub description: String,
    pub staff_status: GateStatus,
    pub hod_status: GateStatus,
    pub final_status: GateStatus,
    pub created_at: DateTime<Utc>,
    pub staff_updated_at: Option<DateTime<Utc>>,
    pub hod_updated_at: Option<DateTime<Utc>>,
}

impl Request {
    /// Builds a freshly submitted request in the initial state for its track.
    pub fn submit(
        requester_id: RequesterId,
        requester_role: RequesterRole,
        title: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let title = validate_text("title", title, TITLE_MAX_CHARS)?;
        let description = validate_text("description", description, DESCRIPTION_MAX_CHARS)?;

        let (staff_status, staff_updated_at) = match requester_role {
            RequesterRole::Student => (GateStatus::Pending, None),
            // Self-requests skip the staff gate entirely.
            RequesterRole::Staff => (GateStatus::Approved, Some(now)),
        };

        Ok(Self {
            id: RequestId::generate(),
            requester_id,
            requester_role,
            title,
            description,
            staff_status,
            hod_status: GateStatus::Pending,
            final_status: GateStatus::Pending,
            created_at: now,
            staff_updated_at,
            hod_updated_at: None,
        })
    }

    pub fn awaits_staff(&self) -> bool {
        self.requester_role == RequesterRole::Student && self.staff_status.is_pending()
    }

    pub fn awaits_hod(&self) -> bool {
        match self.requester_role {
            RequesterRole::Student => {
                self.staff_status == GateStatus::Approved && self.hod_status.is_pending()
            }
            RequesterRole::Staff => self.hod_status.is_pending(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.final_status.is_pending()
    }

    /// Applies the staff gate decision, returning the updated record.
    /// `self` is left untouched so a failed guard never leaves a partial write behind.
    pub fn staff_decide(
        &self,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Self, TransitionError> {
        if !self.staff_status.is_pending() {
            return Err(TransitionError::AlreadyProcessed { gate: Gate::Staff });
        }

        let mut next = self.clone();
        next.staff_status = decision.into();
        next.staff_updated_at = Some(now);
        if decision == Decision::Rejected {
            next.final_status = GateStatus::Rejected;
        }
        Ok(next)
    }

    pub fn hod_decide(&self, decision: Decision, now: DateTime<Utc>) -> Result<Self, TransitionError> {
        if self.staff_status != GateStatus::Approved {
            return Err(TransitionError::StaffApprovalRequired);
        }
        if !self.hod_status.is_pending() {
            return Err(TransitionError::AlreadyProcessed { gate: Gate::Hod });
        }

        let mut next = self.clone();
        next.hod_status = decision.into();
        next.hod_updated_at = Some(now);
        next.final_status = decision.into();
        Ok(next)
    }

    /// Checks the cross-field status invariants. Used when decoding stored rows.
    pub fn check_invariants(&self) -> Result<(), DomainError> {
        let either_rejected = self.staff_status == GateStatus::Rejected
            || self.hod_status == GateStatus::Rejected;
        if (self.final_status == GateStatus::Rejected) != either_rejected {
            return Err(self.violation("final status must be rejected iff a gate rejected"));
        }
        if (self.final_status == GateStatus::Approved) != (self.hod_status == GateStatus::Approved)
        {
            return Err(self.violation("final status must be approved iff HOD approved"));
        }
        if !self.hod_status.is_pending() && self.staff_status != GateStatus::Approved {
            return Err(self.violation("HOD gate resolved before staff approval"));
        }
        if self.requester_role == RequesterRole::Staff && self.staff_status != GateStatus::Approved
        {
            return Err(self.violation("staff self-request must carry staff approval"));
        }
        if self.staff_status.is_pending() == self.staff_updated_at.is_some() {
            return Err(self.violation("staff_updated_at must be set iff staff gate resolved"));
        }
        if self.hod_status.is_pending() == self.hod_updated_at.is_some() {
            return Err(self.violation("hod_updated_at must be set iff HOD gate resolved"));
        }
        Ok(())
    }

    fn violation(&self, detail: &str) -> DomainError {
        DomainError::InvariantViolation(format!("request {}: {detail}", self.id))
    }
}

fn validate_text(field: &'static str, raw: &str, max: usize) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField { field });
    }
    let actual = trimmed.chars().count();
    if actual > max {
        return Err(ValidationError::FieldTooLong { field, max, actual });
    }
    Ok(trimmed.to_string())
}
