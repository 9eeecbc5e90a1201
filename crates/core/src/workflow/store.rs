use async_trait::async_trait;
use thiserror::Error;

use crate::domain::request::{Request, RequestId};
use crate::query::RequestSelector;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

/// Durable keyed storage for request records.
///
/// Opened once at process start and handed to the engine; implementations must make
/// `update_if_unchanged` a single atomic compare-and-swap on the status fields.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: &Request) -> Result<(), StoreError>;

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, StoreError>;

    /// Matching records, newest first.
    async fn find(&self, selector: &RequestSelector) -> Result<Vec<Request>, StoreError>;

    /// Replaces `expected` with `updated` only if the stored staff, HOD and final
    /// statuses still equal those of `expected`. Returns `false` when another writer
    /// got there first.
    async fn update_if_unchanged(
        &self,
        expected: &Request,
        updated: &Request,
    ) -> Result<bool, StoreError>;
}

#[async_trait]
impl<S> RequestStore for std::sync::Arc<S>
where
    S: RequestStore + ?Sized,
{
    async fn insert(&self, request: &Request) -> Result<(), StoreError> {
        (**self).insert(request).await
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find(&self, selector: &RequestSelector) -> Result<Vec<Request>, StoreError> {
        (**self).find(selector).await
    }

    async fn update_if_unchanged(
        &self,
        expected: &Request,
        updated: &Request,
    ) -> Result<bool, StoreError> {
        (**self).update_if_unchanged(expected, updated).await
    }
}
