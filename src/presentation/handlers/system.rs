use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

#[derive(Serialize)]
pub struct SystemInfo {
    pub os: &'static str,
    pub family: &'static str,
    pub arch: &'static str,
    pub cpus: usize,
    pub version: &'static str,
}

impl SystemInfo {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS,
            family: std::env::consts::FAMILY,
            arch: std::env::consts::ARCH,
            cpus: std::thread::available_parallelism().map_or(1, |n| n.get()),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

#[derive(Serialize)]
pub struct SystemResponse {
    pub system: SystemInfo,
}

/// Host details the UI shows next to the engine picker.
pub async fn system_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(SystemResponse {
            system: SystemInfo::current(),
        }),
    )
}
