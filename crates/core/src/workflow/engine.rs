use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, TracingAuditSink,
};
use crate::domain::request::{Decision, Gate, Request, RequestId, TransitionError};
use crate::errors::{ValidationError, WorkflowError};
use crate::identity::{Actor, Operation};
use crate::query::{RequestFilter, RequestSelector, RequestStats, Worklist};
use crate::workflow::store::{RequestStore, StoreError};

/// A lost compare-and-swap is re-read once; the second read always observes the
/// resolved gate, so the guard fails instead of overwriting.
const MAX_DECISION_ATTEMPTS: usize = 2;

type GateTransition = fn(&Request, Decision, DateTime<Utc>) -> Result<Request, TransitionError>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnRequests {
    pub stats: RequestStats,
    pub requests: Vec<Request>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReport {
    pub stats: RequestStats,
    pub count: usize,
    pub requests: Vec<Request>,
}

pub struct WorkflowEngine<S> {
    store: S,
    audit: Arc<dyn AuditSink>,
}

impl<S> WorkflowEngine<S>
where
    S: RequestStore,
{
    pub fn new(store: S) -> Self {
        Self::with_audit_sink(store, Arc::new(TracingAuditSink))
    }

    pub fn with_audit_sink(store: S, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn submit(
        &self,
        actor: &Actor,
        title: &str,
        description: &str,
    ) -> Result<Request, WorkflowError> {
        let requester_role = actor.requester_role().ok_or_else(|| {
            ValidationError::InvalidRequesterRole { role: actor.role.as_str().to_string() }
        })?;

        let request =
            Request::submit(actor.id.clone(), requester_role, title, description, Utc::now())?;
        self.store.insert(&request).await?;

        let context = audit_context(actor);
        self.audit.emit(
            AuditEvent::new(
                Some(request.id.clone()),
                &context,
                "request.submitted",
                AuditCategory::Submission,
                AuditOutcome::Success,
            )
            .with_metadata("requester_role", requester_role.as_str())
            .with_metadata("staff_status", request.staff_status.as_str()),
        );

        Ok(request)
    }

    pub async fn list_own(&self, actor: &Actor) -> Result<OwnRequests, WorkflowError> {
        actor.authorize(Operation::ListOwn)?;
        let requests = self.store.find(&RequestSelector::Requester(actor.id.clone())).await?;
        Ok(OwnRequests { stats: RequestStats::from_records(&requests), requests })
    }

    pub async fn list_staff_pending(&self, actor: &Actor) -> Result<Vec<Request>, WorkflowError> {
        actor.authorize(Operation::ListStaffPending)?;
        Ok(self.store.find(&RequestSelector::Worklist(Worklist::Staff)).await?)
    }

    pub async fn list_hod_pending(&self, actor: &Actor) -> Result<Vec<Request>, WorkflowError> {
        actor.authorize(Operation::ListHodPending)?;
        Ok(self.store.find(&RequestSelector::Worklist(Worklist::Hod)).await?)
    }

    pub async fn staff_decide(
        &self,
        actor: &Actor,
        id: &RequestId,
        decision: Decision,
    ) -> Result<Request, WorkflowError> {
        actor.authorize(Operation::StaffDecide)?;
        self.decide(actor, id, decision, Gate::Staff, Request::staff_decide).await
    }

    pub async fn hod_decide(
        &self,
        actor: &Actor,
        id: &RequestId,
        decision: Decision,
    ) -> Result<Request, WorkflowError> {
        actor.authorize(Operation::HodDecide)?;
        self.decide(actor, id, decision, Gate::Hod, Request::hod_decide).await
    }

    pub async fn report(
        &self,
        actor: &Actor,
        filter: RequestFilter,
    ) -> Result<RequestReport, WorkflowError> {
        actor.authorize(Operation::Report)?;
        filter.validate()?;

        let requests = self.store.find(&RequestSelector::Filter(filter)).await?;
        let stats = RequestStats::from_records(&requests);

        self.audit.emit(
            AuditEvent::new(
                None,
                &audit_context(actor),
                "request.report_generated",
                AuditCategory::Reporting,
                AuditOutcome::Success,
            )
            .with_metadata("count", requests.len().to_string()),
        );

        Ok(RequestReport { stats, count: requests.len(), requests })
    }

    async fn decide(
        &self,
        actor: &Actor,
        id: &RequestId,
        decision: Decision,
        gate: Gate,
        transition: GateTransition,
    ) -> Result<Request, WorkflowError> {
        let context = audit_context(actor);
        let category = match gate {
            Gate::Staff => AuditCategory::StaffGate,
            Gate::Hod => AuditCategory::HodGate,
        };

        for attempt in 1..=MAX_DECISION_ATTEMPTS {
            let current = self
                .store
                .find_by_id(id)
                .await
                .map_err(|error| self.store_failure(&context, id, &category, error))?
                .ok_or_else(|| WorkflowError::NotFound(id.clone()))?;

            let updated = match transition(&current, decision, Utc::now()) {
                Ok(updated) => updated,
                Err(error) => {
                    self.audit.emit(
                        AuditEvent::new(
                            Some(id.clone()),
                            &context,
                            "request.decision_blocked",
                            category.clone(),
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("decision", decision.as_str())
                        .with_metadata("attempt", attempt.to_string())
                        .with_metadata("error", error.to_string()),
                    );
                    return Err(error.into());
                }
            };

            let swapped = self
                .store
                .update_if_unchanged(&current, &updated)
                .await
                .map_err(|error| self.store_failure(&context, id, &category, error))?;
            if swapped {
                self.audit.emit(
                    AuditEvent::new(
                        Some(id.clone()),
                        &context,
                        "request.decided",
                        category.clone(),
                        AuditOutcome::Success,
                    )
                    .with_metadata("decision", decision.as_str())
                    .with_metadata("final_status", updated.final_status.as_str()),
                );
                return Ok(updated);
            }

            warn!(
                event_name = "workflow.request.decision_conflict",
                correlation_id = %context.correlation_id,
                request_id = %id,
                gate = %gate,
                attempt,
                "concurrent decision won the compare-and-swap; re-reading"
            );
        }

        Err(TransitionError::AlreadyProcessed { gate }.into())
    }

    fn store_failure(
        &self,
        context: &AuditContext,
        id: &RequestId,
        category: &AuditCategory,
        error: StoreError,
    ) -> WorkflowError {
        self.audit.emit(
            AuditEvent::new(
                Some(id.clone()),
                context,
                "request.decision_failed",
                category.clone(),
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        );
        error.into()
    }
}

fn audit_context(actor: &Actor) -> AuditContext {
    AuditContext::new(Uuid::new_v4().to_string(), format!("{}:{}", actor.role, actor.id))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::WorkflowEngine;
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::domain::request::{Decision, Request, RequestId};
    use crate::errors::{DomainError, ValidationError, WorkflowError};
    use crate::identity::{Actor, ActorRole};
    use crate::query::{RequestFilter, RequestSelector};
    use crate::workflow::store::{RequestStore, StoreError};

    /// Counts every call and fails all of them, as an unreachable database would.
    #[derive(Default)]
    struct UnreachableStore {
        calls: AtomicUsize,
    }

    impl UnreachableStore {
        fn fail(&self) -> StoreError {
            self.calls.fetch_add(1, Ordering::SeqCst);
            StoreError::Unavailable("connection refused".to_string())
        }
    }

    #[async_trait]
    impl RequestStore for UnreachableStore {
        async fn insert(&self, _request: &Request) -> Result<(), StoreError> {
            Err(self.fail())
        }

        async fn find_by_id(&self, _id: &RequestId) -> Result<Option<Request>, StoreError> {
            Err(self.fail())
        }

        async fn find(&self, _selector: &RequestSelector) -> Result<Vec<Request>, StoreError> {
            Err(self.fail())
        }

        async fn update_if_unchanged(
            &self,
            _expected: &Request,
            _updated: &Request,
        ) -> Result<bool, StoreError> {
            Err(self.fail())
        }
    }

    fn engine() -> (WorkflowEngine<Arc<UnreachableStore>>, Arc<UnreachableStore>, InMemoryAuditSink) {
        let store = Arc::new(UnreachableStore::default());
        let sink = InMemoryAuditSink::default();
        let engine = WorkflowEngine::with_audit_sink(store.clone(), Arc::new(sink.clone()));
        (engine, store, sink)
    }

    #[tokio::test]
    async fn forbidden_callers_never_reach_the_store() {
        let (engine, store, _) = engine();
        let id = RequestId("r-1".to_string());
        let student = Actor::new("alice", ActorRole::Student);
        let admin = Actor::new("root", ActorRole::Admin);

        let results = [
            engine.staff_decide(&student, &id, Decision::Approved).await.map(|_| ()),
            engine.hod_decide(&student, &id, Decision::Approved).await.map(|_| ()),
            engine.list_staff_pending(&admin).await.map(|_| ()),
            engine.list_hod_pending(&student).await.map(|_| ()),
            engine.list_own(&admin).await.map(|_| ()),
            engine.report(&student, RequestFilter::default()).await.map(|_| ()),
        ];

        for result in results {
            assert!(matches!(result, Err(WorkflowError::Forbidden(_))), "got {result:?}");
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_submissions_fail_validation_before_persisting() {
        let (engine, store, sink) = engine();

        let hod = Actor::new("dr-hod", ActorRole::Hod);
        let error = engine.submit(&hod, "Leave", "3 days").await.expect_err("hod cannot submit");
        assert!(matches!(
            error,
            WorkflowError::Domain(DomainError::Validation(
                ValidationError::InvalidRequesterRole { .. }
            ))
        ));
        assert_eq!(error.kind(), "validation_error");

        let student = Actor::new("alice", ActorRole::Student);
        let error = engine.submit(&student, "", "3 days").await.expect_err("blank title");
        assert_eq!(
            error,
            WorkflowError::from(ValidationError::MissingField { field: "title" })
        );

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn store_failures_surface_as_unavailable_without_retry() {
        let (engine, store, sink) = engine();
        let staff = Actor::new("jane", ActorRole::Staff);

        let error = engine
            .staff_decide(&staff, &RequestId("r-1".to_string()), Decision::Rejected)
            .await
            .expect_err("store is down");

        assert!(matches!(error, WorkflowError::StoreUnavailable(_)));
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "request.decision_failed");
        assert_eq!(events[0].outcome, AuditOutcome::Failed);
    }

    #[tokio::test]
    async fn inverted_report_window_is_a_validation_error() {
        let (engine, store, _) = engine();
        let admin = Actor::new("root", ActorRole::Admin);
        let now = chrono::Utc::now();

        let error = engine
            .report(
                &admin,
                RequestFilter {
                    created_from: Some(now),
                    created_to: Some(now - chrono::Duration::days(1)),
                    ..RequestFilter::default()
                },
            )
            .await
            .expect_err("inverted range");

        assert_eq!(error.kind(), "validation_error");
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    /// Keeps records in a `Vec`; enough to drive a submission through one gate.
    #[derive(Default)]
    struct VecStore {
        records: Mutex<Vec<Request>>,
    }

    #[async_trait]
    impl RequestStore for VecStore {
        async fn insert(&self, request: &Request) -> Result<(), StoreError> {
            self.records.lock().expect("store lock").push(request.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &RequestId) -> Result<Option<Request>, StoreError> {
            Ok(self.records.lock().expect("store lock").iter().find(|r| &r.id == id).cloned())
        }

        async fn find(&self, selector: &RequestSelector) -> Result<Vec<Request>, StoreError> {
            let records = self.records.lock().expect("store lock");
            Ok(records.iter().filter(|r| selector.matches(r)).cloned().collect())
        }

        async fn update_if_unchanged(
            &self,
            expected: &Request,
            updated: &Request,
        ) -> Result<bool, StoreError> {
            let mut records = self.records.lock().expect("store lock");
            let Some(stored) = records.iter_mut().find(|r| r.id == expected.id) else {
                return Ok(false);
            };
            let unchanged = (stored.staff_status, stored.hod_status, stored.final_status)
                == (expected.staff_status, expected.hod_status, expected.final_status);
            if unchanged {
                *stored = updated.clone();
            }
            Ok(unchanged)
        }
    }

    /// Counts every tracing event dispatched while it is the default subscriber.
    struct EventCounter(Arc<AtomicUsize>);

    impl tracing::Subscriber for EventCounter {
        fn enabled(&self, _metadata: &tracing::Metadata<'_>) -> bool {
            true
        }

        fn new_span(&self, _span: &tracing::span::Attributes<'_>) -> tracing::span::Id {
            tracing::span::Id::from_u64(1)
        }

        fn record(&self, _span: &tracing::span::Id, _values: &tracing::span::Record<'_>) {}

        fn record_follows_from(&self, _span: &tracing::span::Id, _follows: &tracing::span::Id) {}

        fn event(&self, _event: &tracing::Event<'_>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn enter(&self, _span: &tracing::span::Id) {}

        fn exit(&self, _span: &tracing::span::Id) {}
    }

    #[tokio::test]
    async fn each_successful_transition_is_logged_once() {
        let events = Arc::new(AtomicUsize::new(0));
        let _subscriber =
            tracing::subscriber::set_default(EventCounter(Arc::clone(&events)));
        let engine = WorkflowEngine::new(VecStore::default());

        let request = engine
            .submit(&Actor::new("alice", ActorRole::Student), "Leave", "Two days")
            .await
            .expect("submit");
        assert_eq!(events.load(Ordering::SeqCst), 1, "submission should log one event");

        engine
            .staff_decide(&Actor::new("jane", ActorRole::Staff), &request.id, Decision::Approved)
            .await
            .expect("staff decision");
        assert_eq!(events.load(Ordering::SeqCst), 2, "decision should log one event");
    }
}
