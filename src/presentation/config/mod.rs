mod environment;
mod loader;
mod settings;

pub use environment::Environment;
pub use loader::load_settings;
pub use settings::{
    LocalWhisperSettings, LoggingSettings, NormalizerSetting, OpenAiSettings, ServerSettings,
    Settings, StorageSettings, TranscriptionSettings, UploadSettings,
};
