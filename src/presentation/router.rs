use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    audio_handler, delete_task_handler, edit_segment_handler, engines_handler, export_handler,
    get_task_handler, health_handler, list_tasks_handler, retranscribe_handler, system_handler,
    upload_handler,
};
use crate::presentation::state::AppState;

/// Room for the non-file form fields on top of the upload itself.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let body_limit = usize::try_from(state.settings.upload.max_file_size_mb)
        .ok()
        .and_then(|mb| mb.checked_mul(1024 * 1024))
        .and_then(|bytes| bytes.checked_add(FORM_OVERHEAD_BYTES))
        .unwrap_or(usize::MAX);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/api/engines", get(engines_handler))
        .route("/api/system", get(system_handler))
        .route("/api/upload", post(upload_handler))
        .route("/api/tasks", get(list_tasks_handler))
        .route(
            "/api/task/{task_id}",
            get(get_task_handler).delete(delete_task_handler),
        )
        .route(
            "/api/task/{task_id}/retranscribe",
            post(retranscribe_handler),
        )
        .route("/api/audio/{task_id}", get(audio_handler))
        .route("/api/result/{task_id}/edit", post(edit_segment_handler))
        .route("/api/export/{task_id}", get(export_handler));

    if let Some(static_dir) = state.settings.server.static_dir.as_deref() {
        tracing::info!(static_dir = %static_dir, "Serving static UI");
        router = router.fallback_service(ServeDir::new(static_dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
