use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub upload: UploadSettings,
    pub transcription: TranscriptionSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Served as the fallback route when set.
    #[serde(default)]
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub data_dir: String,
    pub legacy_results_mirror: bool,
}

impl StorageSettings {
    pub fn history_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("history")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("uploads")
    }

    pub fn results_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("results")
    }

    pub fn models_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("models")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadSettings {
    pub max_file_size_mb: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionSettings {
    pub default_engine: String,
    pub default_model: String,
    pub default_language: String,
    pub normalizer: NormalizerSetting,
    #[serde(default)]
    pub ffmpeg_path: Option<String>,
    pub openai: OpenAiSettings,
    pub local_whisper: LocalWhisperSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizerSetting {
    Ffmpeg,
    Native,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalWhisperSettings {
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}
