//! JSON routes over the request workflow.
//!
//! - `POST /api/requests`               submit (student or staff)
//! - `GET  /api/requests/mine`          caller's own requests with counters
//! - `GET  /api/staff/requests`         staff worklist
//! - `PUT  /api/staff/requests/{id}`    staff decision, body `{ "status": ... }`
//! - `GET  /api/hod/requests`           HOD worklist
//! - `PUT  /api/hod/requests/{id}`      HOD decision
//! - `GET  /api/admin/requests`         filtered report
//!
//! Caller identity arrives in `x-actor-id` / `x-actor-role`, set by the
//! authenticating gateway in front of this service.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use gatepass_core::domain::request::{Decision, Request, RequestId};
use gatepass_core::errors::{InterfaceError, WorkflowError};
use gatepass_core::identity::{Actor, ActorRole, AuthorizationError, Operation};
use gatepass_core::query::{RawRequestFilter, RequestStats};
use gatepass_core::workflow::{RequestStore, WorkflowEngine};
use gatepass_core::ValidationError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

pub fn router<S>(engine: Arc<WorkflowEngine<S>>) -> Router
where
    S: RequestStore + 'static,
{
    Router::new()
        .route("/api/requests", post(submit_request::<S>))
        .route("/api/requests/mine", get(list_own::<S>))
        .route("/api/staff/requests", get(list_staff_pending::<S>))
        .route("/api/staff/requests/{id}", put(staff_decide::<S>))
        .route("/api/hod/requests", get(list_hod_pending::<S>))
        .route("/api/hod/requests/{id}", put(hod_decide::<S>))
        .route("/api/admin/requests", get(report::<S>))
        .with_state(engine)
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct RequestEnvelope {
    pub success: bool,
    pub message: String,
    pub request: Request,
}

#[derive(Debug, Serialize)]
pub struct ListEnvelope {
    pub success: bool,
    pub count: usize,
    pub requests: Vec<Request>,
}

#[derive(Debug, Serialize)]
pub struct StatsEnvelope {
    pub success: bool,
    pub stats: RequestStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    pub requests: Vec<Request>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: &'static str,
    message: String,
    correlation_id: String,
}

/// Error response in the `{ success: false, error, message }` envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: &'static str,
    message: String,
    correlation_id: String,
}

impl ApiError {
    fn unauthenticated(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            kind: "unauthenticated",
            message: message.into(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }

    fn malformed_body(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: "validation_error",
            message: message.into(),
            correlation_id: Uuid::new_v4().to_string(),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(error: WorkflowError) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        let kind = error.kind();
        let interface = error.into_interface(correlation_id.clone());

        // Server-side failures get the generic message; the detail stays in the log.
        let (status, message) = match &interface {
            InterfaceError::BadRequest { .. } => {
                (StatusCode::BAD_REQUEST, interface.message().to_string())
            }
            InterfaceError::NotFound { .. } => {
                (StatusCode::NOT_FOUND, interface.message().to_string())
            }
            InterfaceError::Forbidden { .. } => {
                (StatusCode::FORBIDDEN, interface.message().to_string())
            }
            InterfaceError::Conflict { .. } => {
                (StatusCode::CONFLICT, interface.message().to_string())
            }
            InterfaceError::ServiceUnavailable { .. } => {
                error!(
                    event_name = "api.request.store_unavailable",
                    correlation_id = %correlation_id,
                    error = %interface,
                    "record store unavailable"
                );
                (StatusCode::SERVICE_UNAVAILABLE, interface.user_message().to_string())
            }
            InterfaceError::Internal { .. } => {
                error!(
                    event_name = "api.request.internal_error",
                    correlation_id = %correlation_id,
                    error = %interface,
                    "internal error"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, interface.user_message().to_string())
            }
        };

        Self { status, kind, message, correlation_id }
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        WorkflowError::from(error).into()
    }
}

impl From<AuthorizationError> for ApiError {
    fn from(error: AuthorizationError) -> Self {
        WorkflowError::from(error).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::malformed_body(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::malformed_body(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            warn!(
                event_name = "api.request.rejected",
                correlation_id = %self.correlation_id,
                status = self.status.as_u16(),
                error_kind = self.kind,
                message = %self.message,
                "request rejected"
            );
        }

        let body = ErrorBody {
            success: false,
            error: self.kind,
            message: self.message,
            correlation_id: self.correlation_id,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Authenticated caller taken from the gateway identity headers.
#[derive(Debug, Clone)]
pub struct Caller(pub Actor);

impl<St> FromRequestParts<St> for Caller
where
    St: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &St) -> Result<Self, Self::Rejection> {
        let id = header_value(parts, ACTOR_ID_HEADER)
            .ok_or_else(|| ApiError::unauthenticated("missing caller identity"))?;
        let role = header_value(parts, ACTOR_ROLE_HEADER)
            .ok_or_else(|| ApiError::unauthenticated("missing caller role"))?;
        let role = role
            .parse::<ActorRole>()
            .map_err(|error| ApiError::unauthenticated(error.to_string()))?;

        Ok(Self(Actor::new(id, role)))
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

async fn submit_request<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<(StatusCode, Json<RequestEnvelope>), ApiError> {
    let Json(body) = body?;
    let request = engine.submit(&actor, &body.title, &body.description).await?;

    Ok((
        StatusCode::CREATED,
        Json(RequestEnvelope {
            success: true,
            message: "Request submitted successfully".to_string(),
            request,
        }),
    ))
}

async fn list_own<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
) -> Result<Json<StatsEnvelope>, ApiError> {
    let own = engine.list_own(&actor).await?;
    Ok(Json(StatsEnvelope { success: true, stats: own.stats, count: None, requests: own.requests }))
}

async fn list_staff_pending<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
) -> Result<Json<ListEnvelope>, ApiError> {
    let requests = engine.list_staff_pending(&actor).await?;
    Ok(Json(ListEnvelope { success: true, count: requests.len(), requests }))
}

async fn list_hod_pending<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
) -> Result<Json<ListEnvelope>, ApiError> {
    let requests = engine.list_hod_pending(&actor).await?;
    Ok(Json(ListEnvelope { success: true, count: requests.len(), requests }))
}

async fn staff_decide<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<Json<RequestEnvelope>, ApiError> {
    // Role check precedes payload parsing.
    actor.authorize(Operation::StaffDecide)?;
    let decision = parse_decision(body)?;
    let request = engine.staff_decide(&actor, &RequestId(id), decision).await?;
    Ok(Json(decided(decision, request)))
}

async fn hod_decide<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
    Path(id): Path<String>,
    body: Result<Json<DecisionBody>, JsonRejection>,
) -> Result<Json<RequestEnvelope>, ApiError> {
    actor.authorize(Operation::HodDecide)?;
    let decision = parse_decision(body)?;
    let request = engine.hod_decide(&actor, &RequestId(id), decision).await?;
    Ok(Json(decided(decision, request)))
}

async fn report<S: RequestStore>(
    State(engine): State<Arc<WorkflowEngine<S>>>,
    Caller(actor): Caller,
    query: Result<Query<RawRequestFilter>, QueryRejection>,
) -> Result<Json<StatsEnvelope>, ApiError> {
    actor.authorize(Operation::Report)?;
    let Query(raw) = query?;
    let filter = raw.parse()?;
    let report = engine.report(&actor, filter).await?;

    Ok(Json(StatsEnvelope {
        success: true,
        stats: report.stats,
        count: Some(report.count),
        requests: report.requests,
    }))
}

fn parse_decision(body: Result<Json<DecisionBody>, JsonRejection>) -> Result<Decision, ApiError> {
    let Json(body) = body?;
    Ok(body.status.parse::<Decision>()?)
}

fn decided(decision: Decision, request: Request) -> RequestEnvelope {
    RequestEnvelope {
        success: true,
        message: format!("Request {} successfully", decision.as_str()),
        request,
    }
}
