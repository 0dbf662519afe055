use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::{Task, Transcript};
use crate::presentation::state::AppState;

use super::error::{parse_task_id, service_error_response};

#[derive(Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub filename: String,
    pub engine: String,
    pub model: String,
    pub language: String,
    pub status: String,
    pub progress: f32,
    pub message: String,
    pub error: Option<String>,
    pub has_result: bool,
    pub has_media: bool,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Serialize)]
pub struct TaskDetail {
    pub id: String,
    pub filename: String,
    pub engine: String,
    pub model: String,
    pub language: String,
    pub status: String,
    pub progress: f32,
    pub message: String,
    pub result: Option<Transcript>,
    pub error: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

#[derive(Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskSummary>,
}

#[derive(Serialize)]
pub struct TaskResponse {
    pub task: TaskDetail,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl TaskSummary {
    async fn from_task(task: Task) -> Self {
        let has_media = tokio::fs::try_exists(&task.media_path)
            .await
            .unwrap_or(false);
        Self {
            id: task.id.to_string(),
            status: task.status.as_str().to_string(),
            has_result: task.result.is_some(),
            has_media,
            created_at: task.created_at.to_rfc3339(),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
            filename: task.filename,
            engine: task.engine,
            model: task.model,
            language: task.language,
            progress: task.progress,
            message: task.message,
            error: task.error,
        }
    }
}

impl From<Task> for TaskDetail {
    fn from(task: Task) -> Self {
        Self {
            id: task.id.to_string(),
            status: task.status.as_str().to_string(),
            created_at: task.created_at.to_rfc3339(),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
            filename: task.filename,
            engine: task.engine,
            model: task.model,
            language: task.language,
            progress: task.progress,
            message: task.message,
            result: task.result,
            error: task.error,
        }
    }
}

#[tracing::instrument(skip(state))]
pub async fn list_tasks_handler(State(state): State<AppState>) -> Response {
    let tasks = state.transcription_service.list_tasks().await;
    let mut summaries = Vec::with_capacity(tasks.len());
    for task in tasks {
        summaries.push(TaskSummary::from_task(task).await);
    }
    (StatusCode::OK, Json(TaskListResponse { tasks: summaries })).into_response()
}

#[tracing::instrument(skip(state))]
pub async fn get_task_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.transcription_service.get_task(id).await {
        Ok(task) => (
            StatusCode::OK,
            Json(TaskResponse {
                task: TaskDetail::from(task),
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}

#[tracing::instrument(skip(state))]
pub async fn delete_task_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Response {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.transcription_service.delete_task(id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(MessageResponse {
                message: "Task deleted".to_string(),
            }),
        )
            .into_response(),
        Err(e) => service_error_response(e),
    }
}
