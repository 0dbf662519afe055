use config::{Config, ConfigError, File};

use super::{Environment, Settings};

const ENV_PREFIX: &str = "APP";
const ENV_SEPARATOR: &str = "__";

/// Layers built-in defaults, the optional `appsettings.{env}.toml` and
/// `APP__SECTION__KEY` environment variables, in that order.
pub fn load_settings(environment: Environment) -> Result<Settings, ConfigError> {
    let default_engine = if cfg!(feature = "local-whisper") {
        "whisper"
    } else {
        "openai"
    };

    Config::builder()
        .set_default("server.host", "127.0.0.1")?
        .set_default("server.port", 8765)?
        .set_default("storage.data_dir", "./data")?
        .set_default("storage.legacy_results_mirror", true)?
        .set_default("upload.max_file_size_mb", 2000)?
        .set_default("transcription.default_engine", default_engine)?
        .set_default("transcription.default_model", "base")?
        .set_default("transcription.default_language", "auto")?
        .set_default("transcription.normalizer", "ffmpeg")?
        .set_default("transcription.openai.models", vec!["whisper-1"])?
        .set_default("transcription.local_whisper.enabled", cfg!(feature = "local-whisper"))?
        .set_default("logging.level", "info,scrivener=debug,tower_http=debug")?
        .set_default("logging.enable_json", environment.json_logs_by_default())?
        .add_source(
            File::with_name(&format!("appsettings.{}", environment.as_str())).required(false),
        )
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR)
                .list_separator(",")
                .with_list_parse_key("transcription.openai.models")
                .try_parsing(true),
        )
        .build()?
        .try_deserialize()
}
