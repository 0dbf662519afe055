use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::domain::Transcript;

/// A speech-to-text backend. Engines are looked up by [`name`](Self::name)
/// and must never report success with an empty transcript when the model
/// is missing, the audio is unreadable or the backend errors.
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    fn name(&self) -> &str;

    fn display_name(&self) -> &str;

    fn description(&self) -> &str;

    fn is_available(&self) -> bool;

    /// What has to be installed or configured when [`is_available`](Self::is_available) is false.
    fn requirement(&self) -> &str;

    fn list_models(&self) -> Vec<ModelInfo>;

    async fn transcribe(
        &self,
        audio_path: &Path,
        model: &str,
        language: Option<&str>,
        progress: ProgressReporter,
    ) -> Result<Transcript, TranscriptionError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub name: String,
    pub description: String,
}

impl ModelInfo {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub fraction: f32,
    pub message: String,
}

/// Cloneable, thread-safe sink for an engine's `[0, 1]` progress.
/// Usable from blocking threads; reports after the run has ended are dropped.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Option<mpsc::UnboundedSender<ProgressUpdate>>,
}

impl ProgressReporter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressUpdate>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn report(&self, fraction: f32, message: impl Into<String>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(ProgressUpdate {
                fraction,
                message: message.into(),
            });
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("audio decoding failed: {0}")]
    DecodingFailed(String),
    #[error("transcription failed: {0}")]
    TranscriptionFailed(String),
    #[error("model loading failed: {0}")]
    ModelLoadFailed(String),
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
}
