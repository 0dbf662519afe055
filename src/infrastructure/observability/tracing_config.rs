const DEFAULT_FILTER: &str = "info,scrivener=debug,tower_http=debug";

/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub environment: String,
    pub json_format: bool,
    /// Used when `RUST_LOG` is not set.
    pub default_filter: String,
}

impl TracingConfig {
    pub fn new(environment: impl Into<String>, json_format: bool, level: &str) -> Self {
        let level = level.trim();
        Self {
            environment: environment.into(),
            json_format: json_format || log_format_is_json(),
            default_filter: if level.is_empty() {
                DEFAULT_FILTER.to_string()
            } else {
                level.to_string()
            },
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".to_string()),
            json_format: log_format_is_json(),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

fn log_format_is_json() -> bool {
    std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
