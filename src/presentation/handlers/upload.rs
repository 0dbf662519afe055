use axum::Json;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::services::{StagedUpload, TranscriptionRequest};
use crate::presentation::state::AppState;

use super::error::{error_response, service_error_response};

#[derive(Serialize)]
pub struct TaskAcceptedResponse {
    pub task_id: String,
    pub message: String,
}

#[tracing::instrument(skip(state, multipart))]
pub async fn upload_handler(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut staged: Option<StagedUpload> = None;
    let mut request = TranscriptionRequest::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read multipart");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read multipart: {}", e),
                );
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" if staged.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                tracing::debug!(filename = %filename, "Receiving upload");
                match state.transcription_service.stage_upload(&filename, field).await {
                    Ok(upload) => staged = Some(upload),
                    Err(e) => return service_error_response(e),
                }
            }
            "engine" => request.engine = read_text(field).await,
            "model" => request.model = read_text(field).await,
            "language" => request.language = read_text(field).await,
            other => tracing::debug!(field = %other, "Ignoring multipart field"),
        }
    }

    let Some(upload) = staged else {
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    match state.transcription_service.submit(upload, request).await {
        Ok(task_id) => (
            StatusCode::OK,
            Json(TaskAcceptedResponse {
                task_id: task_id.to_string(),
                message: "Task created".to_string(),
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

pub(super) async fn read_text(field: axum::extract::multipart::Field<'_>) -> Option<String> {
    match field.text().await {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable form field");
            None
        }
    }
}
