pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod identity;
pub mod query;
pub mod workflow;

pub use chrono;

pub use audit::{AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use domain::request::{
    Decision, Gate, GateStatus, Request, RequestId, RequesterId, RequesterRole, TransitionError,
};
pub use errors::{DomainError, InterfaceError, ValidationError, WorkflowError};
pub use identity::{Actor, ActorRole, AuthorizationError, Operation};
pub use query::{RequestFilter, RequestSelector, RequestStats, Worklist};
pub use workflow::{OwnRequests, RequestReport, RequestStore, StoreError, WorkflowEngine};
