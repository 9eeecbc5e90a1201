pub mod engine;
pub mod store;

pub use engine::{OwnRequests, RequestReport, WorkflowEngine};
pub use store::{RequestStore, StoreError};
