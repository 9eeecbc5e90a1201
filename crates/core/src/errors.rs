use thiserror::Error;

use crate::domain::request::{RequestId, TransitionError};
use crate::identity::AuthorizationError;
use crate::workflow::store::StoreError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is required")]
    MissingField { field: &'static str },
    #[error("{field} cannot exceed {max} characters (got {actual})")]
    FieldTooLong { field: &'static str, max: usize, actual: usize },
    #[error("invalid requester role `{role}` (expected student|staff)")]
    InvalidRequesterRole { role: String },
    #[error("invalid actor role `{role}` (expected student|staff|hod|admin)")]
    InvalidActorRole { role: String },
    #[error("invalid status `{value}`. must be approved or rejected")]
    InvalidDecision { value: String },
    #[error("invalid final status `{value}` (expected pending|approved|rejected)")]
    InvalidStatus { value: String },
    #[error("invalid {field} `{value}` (expected RFC 3339 timestamp or YYYY-MM-DD)")]
    InvalidDate { field: &'static str, value: String },
    #[error("invalid date range: start {start} is after end {end}")]
    InvertedDateRange { start: String, end: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("request {0} not found")]
    NotFound(RequestId),
    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),
    #[error("record store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<ValidationError> for WorkflowError {
    fn from(value: ValidationError) -> Self {
        Self::Domain(DomainError::Validation(value))
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(value: TransitionError) -> Self {
        Self::Domain(DomainError::Transition(value))
    }
}

impl From<StoreError> for WorkflowError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(_) => Self::StoreUnavailable(value.to_string()),
            StoreError::Corrupt(detail) => Self::Domain(DomainError::InvariantViolation(detail)),
        }
    }
}

impl WorkflowError {
    /// Stable machine-readable kind, used in API payloads and audit metadata.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(DomainError::Validation(_)) => "validation_error",
            Self::Domain(DomainError::Transition(_)) => "invalid_state",
            Self::Domain(DomainError::InvariantViolation(_)) => "invariant_violation",
            Self::NotFound(_) => "not_found",
            Self::Forbidden(_) => "forbidden",
            Self::StoreUnavailable(_) => "store_unavailable",
        }
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested record does not exist.",
            Self::Forbidden { .. } => "Your role is not permitted to perform this action.",
            Self::Conflict { .. } => "The request has already moved past this approval step.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::Forbidden { message, .. }
            | Self::Conflict { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl From<WorkflowError> for InterfaceError {
    fn from(value: WorkflowError) -> Self {
        let correlation_id = "unassigned".to_owned();
        let message = value.to_string();
        match value {
            WorkflowError::Domain(DomainError::Validation(_)) => {
                Self::BadRequest { message, correlation_id }
            }
            WorkflowError::Domain(DomainError::Transition(_)) => {
                Self::Conflict { message, correlation_id }
            }
            WorkflowError::Domain(DomainError::InvariantViolation(_)) => {
                Self::Internal { message, correlation_id }
            }
            WorkflowError::NotFound(_) => Self::NotFound { message, correlation_id },
            WorkflowError::Forbidden(_) => Self::Forbidden { message, correlation_id },
            WorkflowError::StoreUnavailable(_) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
        }
    }
}
