use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::services::ServiceError;
use crate::domain::TaskId;

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Internal details go to the log, never into the response body.
pub fn service_error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::Validation(_) | ServiceError::TaskBusy(..) => StatusCode::BAD_REQUEST,
        ServiceError::NotFound(_) | ServiceError::MediaMissing(_) => StatusCode::NOT_FOUND,
        ServiceError::WorkerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ServiceError::Internal(detail) => {
            tracing::error!(error = %detail, "Request failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error");
        }
    };
    tracing::debug!(status = %status, error = %error, "Request rejected");
    error_response(status, error.to_string())
}

/// Ids that do not parse cannot name a task.
pub fn parse_task_id(raw: &str) -> Result<TaskId, Response> {
    raw.parse::<TaskId>()
        .map_err(|_| error_response(StatusCode::NOT_FOUND, "Task not found"))
}
