use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::HeaderValue;
use axum::http::header::CONTENT_TYPE;
use axum::response::Response;
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::presentation::state::AppState;

use super::error::{parse_task_id, service_error_response};

/// Range requests are honoured so the player can seek.
#[tracing::instrument(skip(state, request))]
pub async fn audio_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    request: Request,
) -> Response {
    let id = match parse_task_id(&task_id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let audio = match state.transcription_service.playback_audio(id).await {
        Ok(audio) => audio,
        Err(e) => return service_error_response(e),
    };

    let response = match ServeFile::new(&audio.path).oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };

    let mut response = response.map(Body::new);
    if response.status().is_success() {
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(audio.content_type));
    }
    response
}
