use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};

use super::domain::BackgroundActionStatus;
use super::repository::{PlanRepository, PlanStatusView};
use super::transitions::{PlanAction, TRANSITIONS};
use super::workflow::{ApprovalWorkflow, CapabilityCheck, PlanCommand};
use crate::error::AppError;
use crate::workflows::{ActorId, PlanId};

/// Body of `POST /api/v1/payment-plans`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenPlanRequest {
    pub plan_id: PlanId,
    pub actor_id: ActorId,
}

/// Body of `PUT /api/v1/payment-plans/:plan_id/background-action`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundActionRequest {
    #[serde(default)]
    pub background_action: Option<BackgroundActionStatus>,
    #[serde(default)]
    pub expected_version: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
struct TransitionResponse {
    action: PlanAction,
    from: &'static str,
    status_changed: bool,
    plan: PlanStatusView,
}

/// Router exposing the payment plan lifecycle over HTTP.
pub fn payment_plan_router<R, C>(workflow: Arc<ApprovalWorkflow<R, C>>) -> Router
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    Router::new()
        .route("/api/v1/payment-plans/transitions", get(transitions_handler))
        .route("/api/v1/payment-plans", post(open_handler::<R, C>))
        .route(
            "/api/v1/payment-plans/:plan_id",
            get(status_handler::<R, C>),
        )
        .route(
            "/api/v1/payment-plans/:plan_id/actions",
            post(action_handler::<R, C>),
        )
        .route(
            "/api/v1/payment-plans/:plan_id/background-action",
            put(background_action_handler::<R, C>),
        )
        .with_state(workflow)
}

pub(crate) async fn transitions_handler() -> Response {
    (StatusCode::OK, axum::Json(TRANSITIONS)).into_response()
}

pub(crate) async fn open_handler<R, C>(
    State(workflow): State<Arc<ApprovalWorkflow<R, C>>>,
    axum::Json(request): axum::Json<OpenPlanRequest>,
) -> Response
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    match workflow.open(request.plan_id, &request.actor_id) {
        Ok(plan) => (StatusCode::CREATED, axum::Json(plan.status_view())).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn status_handler<R, C>(
    State(workflow): State<Arc<ApprovalWorkflow<R, C>>>,
    Path(plan_id): Path<String>,
) -> Response
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    match workflow.status_view(&PlanId(plan_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn action_handler<R, C>(
    State(workflow): State<Arc<ApprovalWorkflow<R, C>>>,
    Path(plan_id): Path<String>,
    axum::Json(command): axum::Json<PlanCommand>,
) -> Response
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    match workflow.apply(&PlanId(plan_id), command) {
        Ok(outcome) => {
            let payload = TransitionResponse {
                action: outcome.action,
                from: outcome.from.label(),
                status_changed: outcome.status_changed(),
                plan: outcome.plan.status_view(),
            };
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => AppError::from(error).into_response(),
    }
}

pub(crate) async fn background_action_handler<R, C>(
    State(workflow): State<Arc<ApprovalWorkflow<R, C>>>,
    Path(plan_id): Path<String>,
    axum::Json(request): axum::Json<BackgroundActionRequest>,
) -> Response
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    match workflow.set_background_action(
        &PlanId(plan_id),
        request.background_action,
        request.expected_version,
    ) {
        Ok(plan) => (StatusCode::OK, axum::Json(plan.status_view())).into_response(),
        Err(error) => AppError::from(error).into_response(),
    }
}
