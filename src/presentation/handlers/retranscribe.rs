use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::services::TranscriptionRequest;
use crate::presentation::state::AppState;

use super::error::{error_response, parse_task_id, service_error_response};
use super::upload::{TaskAcceptedResponse, read_text};

/// Form fields left out keep the task's previous engine, model and language.
#[tracing::instrument(skip(state, multipart))]
pub async fn retranscribe_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut request = TranscriptionRequest::default();
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                match name.as_str() {
                    "engine" => request.engine = read_text(field).await,
                    "model" => request.model = read_text(field).await,
                    "language" => request.language = read_text(field).await,
                    _ => {}
                }
            }
            Ok(None) => break,
            Err(e) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read multipart: {}", e),
                );
            }
        }
    }

    match state.transcription_service.retranscribe(id, request).await {
        Ok(()) => (
            StatusCode::OK,
            Json(TaskAcceptedResponse {
                task_id: id.to_string(),
                message: "Retranscription started".to_string(),
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}
