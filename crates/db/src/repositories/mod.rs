use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use gatepass_core::workflow::StoreError;

pub mod memory;
pub mod request;

pub use memory::InMemoryRequestRepository;
pub use request::SqlRequestRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("request `{0}` already exists")]
    Duplicate(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Decode(detail) => StoreError::Corrupt(detail),
            other @ (RepositoryError::Database(_) | RepositoryError::Duplicate(_)) => {
                StoreError::Unavailable(other.to_string())
            }
        }
    }
}

/// Fixed-width RFC 3339 so that text order in SQLite equals chronological order.
pub(crate) fn encode_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid {column} `{raw}`: {error}")))
}
