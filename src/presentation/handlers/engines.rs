use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::services::EngineInfo;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct EnginesResponse {
    pub engines: Vec<EngineInfo>,
}

pub async fn engines_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(EnginesResponse {
            engines: state.transcription_service.engines(),
        }),
    )
}
