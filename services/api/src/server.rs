use crate::cli::ServeArgs;
use crate::infra::{
    sample_exclusions, sample_registry, AppState, RoleCapabilities, TargetingState,
};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use benefit_plans::config::AppConfig;
use benefit_plans::error::AppError;
use benefit_plans::telemetry;
use benefit_plans::workflows::payment_plan::{ApprovalWorkflow, InMemoryPlanRepository};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let workflow = Arc::new(ApprovalWorkflow::new(
        Arc::new(InMemoryPlanRepository::new()),
        Arc::new(RoleCapabilities::for_quorum(config.approvals)),
        config.approvals,
    )?);
    let targeting = TargetingState::new(sample_registry(), sample_exclusions());

    let app = with_service_routes(workflow)
        .layer(Extension(app_state))
        .layer(Extension(targeting))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        approval = config.approvals.approval,
        authorization = config.approvals.authorization,
        finance_release = config.approvals.finance_release,
        "payment plan service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
