use crate::infra::{AppState, TargetingState};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use benefit_plans::error::AppError;
use benefit_plans::workflows::payment_plan::{
    payment_plan_router, ApprovalWorkflow, CapabilityCheck, PlanRepository,
};
use benefit_plans::workflows::targeting::{CriteriaSet, TargetingPreview};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct PreviewRequest {
    pub(crate) criteria: CriteriaSet,
    /// Households to evaluate. Defaults to every household in the registry.
    #[serde(default)]
    pub(crate) household_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PreviewResponse {
    pub(crate) description: String,
    pub(crate) evaluated: usize,
    #[serde(flatten)]
    pub(crate) preview: TargetingPreview,
}

pub(crate) fn with_service_routes<R, C>(workflow: Arc<ApprovalWorkflow<R, C>>) -> axum::Router
where
    R: PlanRepository + 'static,
    C: CapabilityCheck + 'static,
{
    payment_plan_router(workflow)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/targeting/preview",
            axum::routing::post(preview_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn preview_endpoint(
    Extension(targeting): Extension<TargetingState>,
    Json(request): Json<PreviewRequest>,
) -> Result<Json<PreviewResponse>, AppError> {
    let PreviewRequest {
        criteria,
        household_ids,
    } = request;

    let household_ids = household_ids.unwrap_or_else(|| targeting.candidates.clone());
    let preview = targeting.service.preview(&criteria, &household_ids)?;

    Ok(Json(PreviewResponse {
        description: criteria.describe(),
        evaluated: household_ids.len(),
        preview,
    }))
}
