use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::domain::TaskStatus;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engines_available: usize,
    pub tasks_running: usize,
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let service = &state.transcription_service;
    let engines_available = service.engines().iter().filter(|e| e.available).count();
    let tasks_running = service
        .list_tasks()
        .await
        .iter()
        .filter(|t| t.status == TaskStatus::Processing)
        .count();

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy",
            engines_available,
            tasks_running,
        }),
    )
}
