use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::presentation::state::AppState;

use super::error::{error_response, parse_task_id, service_error_response};
use super::tasks::MessageResponse;

#[tracing::instrument(skip(state, multipart))]
pub async fn edit_segment_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let mut segment_index: Option<String> = None;
    let mut text: Option<String> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                let name = field.name().unwrap_or_default().to_string();
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read field {}: {}", name, e),
                        );
                    }
                };
                match name.as_str() {
                    "segment_index" => segment_index = Some(value),
                    "text" => text = Some(value),
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

    let index = match segment_index.as_deref().map(|raw| raw.trim().parse::<usize>()) {
        Some(Ok(index)) => index,
        Some(Err(_)) => {
            return error_response(StatusCode::BAD_REQUEST, "segment_index must be a non-negative integer");
        }
        None => return error_response(StatusCode::BAD_REQUEST, "segment_index is required"),
    };
    let Some(text) = text else {
        return error_response(StatusCode::BAD_REQUEST, "text is required");
    };

    match state
        .transcription_service
        .edit_segment(id, index, &text)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Segment updated".to_string(),
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}
