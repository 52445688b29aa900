use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::payment_plan::{PlanRepositoryError, WorkflowError};
use crate::workflows::targeting::{BuildError, TargetingError};
use crate::workflows::ValidationError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Validation(ValidationError),
    Workflow(WorkflowError),
    Targeting(TargetingError),
    Build(BuildError),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Workflow(err) => workflow_status(err),
            AppError::Build(BuildError::EmptyCriteria(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Build(BuildError::InvalidProgress { .. }) => StatusCode::CONFLICT,
            AppError::Build(BuildError::Executor(_)) | AppError::Targeting(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn workflow_status(err: &WorkflowError) -> StatusCode {
    match err {
        WorkflowError::PermissionDenied { .. } => StatusCode::FORBIDDEN,
        WorkflowError::InvalidTransition { .. }
        | WorkflowError::Conflict { .. }
        | WorkflowError::DuplicateDecision { .. }
        | WorkflowError::Repository(PlanRepositoryError::AlreadyExists)
        | WorkflowError::Repository(PlanRepositoryError::Conflict { .. }) => StatusCode::CONFLICT,
        WorkflowError::MissingFsp | WorkflowError::Validation(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        WorkflowError::NotFound(_) | WorkflowError::Repository(PlanRepositoryError::NotFound) => {
            StatusCode::NOT_FOUND
        }
        WorkflowError::Repository(PlanRepositoryError::Unavailable(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Validation(err) => write!(f, "validation error: {}", err),
            AppError::Workflow(err) => write!(f, "workflow error: {}", err),
            AppError::Targeting(err) => write!(f, "targeting error: {}", err),
            AppError::Build(err) => write!(f, "build error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Validation(err) => Some(err),
            AppError::Workflow(err) => Some(err),
            AppError::Targeting(err) => Some(err),
            AppError::Build(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<ValidationError> for AppError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

impl From<TargetingError> for AppError {
    fn from(value: TargetingError) -> Self {
        Self::Targeting(value)
    }
}

impl From<BuildError> for AppError {
    fn from(value: BuildError) -> Self {
        Self::Build(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::payment_plan::{PlanAction, PlanStatus};
    use crate::workflows::PlanId;

    #[test]
    fn workflow_errors_map_to_http_statuses() {
        let invalid = AppError::from(WorkflowError::InvalidTransition {
            status: PlanStatus::Finished,
            action: PlanAction::Lock,
        });
        assert_eq!(invalid.status_code(), StatusCode::CONFLICT);

        let missing = AppError::from(WorkflowError::NotFound(PlanId::new("PP-404")));
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let validation = AppError::from(ValidationError::EmptyCriterion);
        assert_eq!(validation.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn display_prefixes_the_error_family() {
        let err = AppError::from(BuildError::EmptyCriteria(PlanId::new("PP-1")));
        assert_eq!(
            err.to_string(),
            "build error: plan PP-1 has no authored criteria to build from"
        );
    }
}
