use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use gatepass_core::domain::request::{Request, RequestId};
use gatepass_core::query::{most_recent_first, RequestSelector};
use gatepass_core::workflow::{RequestStore, StoreError};

use super::RepositoryError;

/// Process-local store. The write lock makes `update_if_unchanged` atomic.
#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, Request>>,
}

impl InMemoryRequestRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestRepository {
    async fn insert(&self, request: &Request) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id.0) {
            return Err(RepositoryError::Duplicate(request.id.0.clone()).into());
        }
        requests.insert(request.id.0.clone(), request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
        Ok(self.requests.read().await.get(&id.0).cloned())
    }

    async fn find(&self, selector: &RequestSelector) -> Result<Vec<Request>, StoreError> {
        let mut matches = self
            .requests
            .read()
            .await
            .values()
            .filter(|request| selector.matches(request))
            .cloned()
            .collect::<Vec<_>>();
        matches.sort_by(most_recent_first);
        Ok(matches)
    }

    async fn update_if_unchanged(
        &self,
        expected: &Request,
        updated: &Request,
    ) -> Result<bool, StoreError> {
        let mut requests = self.requests.write().await;
        let Some(stored) = requests.get_mut(&expected.id.0) else {
            return Ok(false);
        };

        let unchanged = stored.staff_status == expected.staff_status
            && stored.hod_status == expected.hod_status
            && stored.final_status == expected.final_status;
        if unchanged {
            *stored = updated.clone();
        }
        Ok(unchanged)
    }
}

#[cfg(test)]
mod tests {
    use gatepass_core::chrono::Utc;
    use gatepass_core::domain::request::{Decision, Request, RequesterId, RequesterRole};
    use gatepass_core::workflow::{RequestStore, StoreError};

    use super::InMemoryRequestRepository;

    fn student_request() -> Request {
        Request::submit(
            RequesterId("alice".to_string()),
            RequesterRole::Student,
            "Lab access",
            "Weekend access to lab 3",
            Utc::now(),
        )
        .expect("valid request")
    }

    #[tokio::test]
    async fn in_memory_request_repo_round_trip() {
        let repo = InMemoryRequestRepository::new();
        let request = student_request();

        repo.insert(&request).await.expect("insert");

        let loaded = repo.find_by_id(&request.id).await.expect("find");
        assert_eq!(loaded, Some(request));
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_refused() {
        let repo = InMemoryRequestRepository::new();
        let request = student_request();

        repo.insert(&request).await.expect("first insert");
        let error = repo.insert(&request).await.expect_err("duplicate insert");
        assert!(matches!(error, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn stale_snapshot_loses_the_swap() {
        let repo = InMemoryRequestRepository::new();
        let original = student_request();
        repo.insert(&original).await.expect("insert");

        let approved = original.staff_decide(Decision::Approved, Utc::now()).expect("approve");
        let rejected = original.staff_decide(Decision::Rejected, Utc::now()).expect("reject");

        assert!(repo.update_if_unchanged(&original, &approved).await.expect("first swap"));
        assert!(!repo.update_if_unchanged(&original, &rejected).await.expect("second swap"));

        let stored = repo.find_by_id(&original.id).await.expect("find").expect("present");
        assert_eq!(stored, approved);
    }
}
