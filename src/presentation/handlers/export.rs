use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::presentation::state::AppState;

use super::error::{parse_task_id, service_error_response};

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "srt".to_string()
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub content: String,
    pub filename: String,
}

#[tracing::instrument(skip(state))]
pub async fn export_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state
        .transcription_service
        .export(id, &query.format)
        .await
    {
        Ok(export) => (
            StatusCode::OK,
            Json(ExportResponse {
                content: export.content,
                filename: export.filename,
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}
