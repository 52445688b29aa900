use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::payment_plan::{
    ApprovalQuorum, ApprovalWorkflow, PlanAction, PlanStatus,
};

fn json_request(method: &str, uri: &str, payload: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&payload).unwrap()))
        .unwrap()
}

#[tokio::test]
async fn transitions_route_publishes_the_table() {
    let (workflow, _) = build_workflow(ApprovalQuorum::default());
    let response = router_with(workflow)
        .oneshot(
            Request::get("/api/v1/payment-plans/transitions")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    let entries = payload.as_array().expect("array of transitions");
    assert_eq!(entries.len(), 13);
    assert_eq!(entries[0].get("from"), Some(&json!("OPEN")));
    assert_eq!(entries[0].get("action"), Some(&json!("lock")));
    assert_eq!(entries[0].get("guard"), Some(&json!("lock")));
}

#[tokio::test]
async fn open_route_creates_plans_once() {
    let (workflow, _) = build_workflow(ApprovalQuorum::default());
    let router = router_with(workflow);
    let body = json!({ "plan_id": "PP-0001", "actor_id": "admin" });

    let created = router
        .clone()
        .oneshot(json_request("POST", "/api/v1/payment-plans", body.clone()))
        .await
        .expect("route executes");
    assert_eq!(created.status(), StatusCode::CREATED);
    let payload = read_json_body(created).await;
    assert_eq!(payload.get("status"), Some(&json!("OPEN")));
    assert_eq!(payload.get("version"), Some(&json!(1)));
    assert_eq!(
        payload.get("available_actions"),
        Some(&json!(["lock", "remove"]))
    );

    let duplicate = router
        .oneshot(json_request("POST", "/api/v1/payment-plans", body))
        .await
        .expect("route executes");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn action_route_reports_the_transition() {
    let (workflow, _) = build_workflow(ApprovalQuorum::default());
    plan_at(&workflow, PlanStatus::InApproval);

    let response = router_with(workflow)
        .oneshot(json_request(
            "POST",
            "/api/v1/payment-plans/PP-0001/actions",
            json!({ "actor_id": "approver-1", "action": "approve", "comment": "ok" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("from"), Some(&json!("IN_APPROVAL")));
    assert_eq!(payload.get("status_changed"), Some(&json!(true)));
    assert_eq!(
        payload.pointer("/plan/status"),
        Some(&json!("IN_AUTHORIZATION"))
    );
    assert_eq!(payload.pointer("/plan/approvals/approval"), Some(&json!(1)));
}

#[tokio::test]
async fn action_handler_maps_workflow_errors() {
    let (workflow, _) = build_workflow(ApprovalQuorum::default());
    plan_at(&workflow, PlanStatus::LockedFsp);
    let workflow = Arc::new(workflow);

    let denied = crate::workflows::payment_plan::router::action_handler(
        State(workflow.clone()),
        Path("PP-0001".to_string()),
        axum::Json(command("clerk", PlanAction::SendForApproval)),
    )
    .await;
    assert_eq!(denied.status(), StatusCode::FORBIDDEN);

    let invalid = crate::workflows::payment_plan::router::action_handler(
        State(workflow.clone()),
        Path("PP-0001".to_string()),
        axum::Json(command("admin", PlanAction::Approve)),
    )
    .await;
    assert_eq!(invalid.status(), StatusCode::CONFLICT);
    let payload = read_json_body(invalid).await;
    assert!(payload
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .contains("cannot approve a plan in status LOCKED_FSP"));

    let stale = crate::workflows::payment_plan::router::action_handler(
        State(workflow),
        Path("PP-0001".to_string()),
        axum::Json(command("admin", PlanAction::UnlockFsp).expecting(1)),
    )
    .await;
    assert_eq!(stale.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn status_handler_maps_missing_and_unavailable_plans() {
    let (workflow, _) = build_workflow(ApprovalQuorum::default());
    let missing = crate::workflows::payment_plan::router::status_handler(
        State(Arc::new(workflow)),
        Path("PP-404".to_string()),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let offline = Arc::new(
        ApprovalWorkflow::new(
            Arc::new(UnavailableRepository),
            Arc::new(CapabilityTable::standard()),
            ApprovalQuorum::default(),
        )
        .expect("valid quorum"),
    );
    let unavailable = crate::workflows::payment_plan::router::status_handler(
        State(offline),
        Path("PP-0001".to_string()),
    )
    .await;
    assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn background_action_route_leaves_status_alone() {
    let (workflow, _) = build_workflow(ApprovalQuorum::default());
    let plan = plan_at(&workflow, PlanStatus::InAuthorization);
    let router = router_with(workflow);

    let response = router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/v1/payment-plans/PP-0001/background-action",
            json!({
                "background_action": "SEND_TO_PAYMENT_GATEWAY_ERROR",
                "expected_version": plan.version(),
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload.get("status"), Some(&json!("IN_AUTHORIZATION")));
    assert_eq!(
        payload.get("background_action"),
        Some(&json!("SEND_TO_PAYMENT_GATEWAY_ERROR"))
    );
    assert_eq!(payload.get("version"), Some(&json!(plan.version() + 1)));

    let cleared = router
        .oneshot(json_request(
            "PUT",
            "/api/v1/payment-plans/PP-0001/background-action",
            json!({ "background_action": null }),
        ))
        .await
        .expect("route executes");
    let payload = read_json_body(cleared).await;
    assert!(payload.get("background_action").is_none());
}
