//! Axum router wiring (HTTP -> engine services).
//!
//! The HTTP layer is a thin translation surface: it deserializes contexts,
//! calls into the services, and maps `VerdictError` onto stable status
//! codes. No decision logic lives here.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use verdict_core::error::{ErrorCode, VerdictError};
use verdict_core::policy::{OperationType, PolicyContext};

use crate::app_state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/evaluate", post(evaluate))
        .route("/v1/chains/evaluate", post(evaluate_chain))
        .route("/v1/enforce", post(enforce))
        .route("/v1/policies", get(list_policies))
        .route("/v1/agents/:agent_id/compliance", post(check_compliance))
        .route("/v1/agents/:agent_id/recommendations", post(recommend_policies))
        .route("/v1/admin/chains/:workflow", put(register_chain))
        .route("/v1/admin/agents/:agent_id", put(register_agent))
        .route("/v1/admin/backend", post(switch_backend))
        .route("/v1/metrics", get(decision_metrics))
        .route("/healthz", get(healthz))
        .route("/metrics", get(prometheus_metrics))
        .with_state(state)
}

/// HTTP projection of `VerdictError`.
struct ApiError(VerdictError);

impl From<VerdictError> for ApiError {
    fn from(err: VerdictError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.error_code();
        let status = match code {
            ErrorCode::ChainNotFound => StatusCode::NOT_FOUND,
            ErrorCode::BadRequest | ErrorCode::InvalidConfig | ErrorCode::UnsupportedVersion => {
                StatusCode::BAD_REQUEST
            }
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": self.0.to_string(),
            "code": code.as_str(),
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct EvaluateRequest {
    policy_id: String,
    context: PolicyContext,
}

async fn evaluate(
    State(state): State<AppState>,
    Json(req): Json<EvaluateRequest>,
) -> impl IntoResponse {
    let result = state.composition().evaluate(&req.policy_id, &req.context).await;
    Json(result)
}

#[derive(Debug, Deserialize)]
struct ChainEvaluateRequest {
    /// Registered workflow name; mutually exclusive with `policy_ids`.
    workflow: Option<String>,
    /// Explicit ad-hoc chain.
    policy_ids: Option<Vec<String>>,
    context: PolicyContext,
}

async fn evaluate_chain(
    State(state): State<AppState>,
    Json(req): Json<ChainEvaluateRequest>,
) -> Result<Response, ApiError> {
    let eval = match (req.workflow, req.policy_ids) {
        (Some(workflow), None) => state.composition().orchestrate(&workflow, &req.context).await?,
        (None, Some(policy_ids)) => {
            state.composition().evaluate_chain(&policy_ids, &req.context).await
        }
        _ => {
            return Err(VerdictError::BadRequest(
                "exactly one of workflow or policy_ids is required".into(),
            )
            .into())
        }
    };
    Ok(Json(eval).into_response())
}

#[derive(Debug, Deserialize)]
struct EnforceRequest {
    operation_type: String,
    context: PolicyContext,
}

async fn enforce(
    State(state): State<AppState>,
    Json(req): Json<EnforceRequest>,
) -> Result<Response, ApiError> {
    let operation: OperationType = req.operation_type.parse()?;
    let outcome = state.enforcement().enforce(operation, &req.context).await?;
    Ok(Json(outcome).into_response())
}

async fn list_policies(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.composition().list_policies().await)
}

#[derive(Debug, Deserialize)]
struct ContextRequest {
    context: PolicyContext,
}

async fn check_compliance(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<ContextRequest>,
) -> Result<Response, ApiError> {
    let record = state.enforcement().check_compliance(&agent_id, &req.context).await?;
    Ok(Json(record).into_response())
}

async fn recommend_policies(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<ContextRequest>,
) -> impl IntoResponse {
    let policy_ids = state
        .enforcement()
        .recommend_policies(&agent_id, &req.context)
        .await;
    Json(json!({ "agent_id": agent_id, "policy_ids": policy_ids }))
}

#[derive(Debug, Deserialize)]
struct ChainUpdateRequest {
    policy_ids: Vec<String>,
}

async fn register_chain(
    State(state): State<AppState>,
    Path(workflow): Path<String>,
    Json(req): Json<ChainUpdateRequest>,
) -> impl IntoResponse {
    state.composition().register_chain(workflow.clone(), req.policy_ids);
    Json(json!({ "workflow": workflow, "registered": true }))
}

#[derive(Debug, Deserialize)]
struct AgentUpdateRequest {
    capabilities: Vec<OperationType>,
}

async fn register_agent(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Json(req): Json<AgentUpdateRequest>,
) -> impl IntoResponse {
    state.enforcement().register_agent(agent_id.clone(), req.capabilities);
    Json(json!({ "agent_id": agent_id, "registered": true }))
}

#[derive(Debug, Deserialize)]
struct BackendSwitchRequest {
    backend: String,
}

async fn switch_backend(
    State(state): State<AppState>,
    Json(req): Json<BackendSwitchRequest>,
) -> Result<Response, ApiError> {
    let previous = state.switch_backend(&req.backend)?;
    Ok(Json(json!({ "active": req.backend, "previous": previous })).into_response())
}

async fn decision_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.composition().get_metrics())
}

async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.composition().health_check().await)
}

async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics().render()
}
