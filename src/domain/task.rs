use std::path::PathBuf;

use chrono::{DateTime, Utc};

use super::{TaskId, TaskStatus, Transcript};

/// Engine, model and language requested for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptionConfig {
    pub engine: String,
    pub model: String,
    pub language: String,
}

impl TranscriptionConfig {
    pub fn new(
        engine: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            engine: engine.into(),
            model: model.into(),
            language: language.into(),
        }
    }

    /// The language hint handed to an engine; `auto` and blank mean "detect".
    pub fn language_hint(&self) -> Option<&str> {
        language_hint(&self.language)
    }
}

pub fn language_hint(language: &str) -> Option<&str> {
    let trimmed = language.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("auto") {
        None
    } else {
        Some(trimmed)
    }
}

/// One transcription job and its full lifecycle record.
///
/// Mutation goes through the transition methods below, which keep
/// `result` set only when `Completed` and `error` set only when `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    pub filename: String,
    pub engine: String,
    pub model: String,
    pub language: String,
    pub media_path: PathBuf,
    pub wav_path: Option<PathBuf>,
    pub status: TaskStatus,
    pub progress: f32,
    pub message: String,
    pub result: Option<Transcript>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        filename: String,
        config: TranscriptionConfig,
        media_path: PathBuf,
    ) -> Self {
        Self {
            id,
            filename,
            engine: config.engine,
            model: config.model,
            language: config.language,
            media_path,
            wav_path: None,
            status: TaskStatus::Pending,
            progress: 0.0,
            message: "Waiting to be processed".to_string(),
            result: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn config(&self) -> TranscriptionConfig {
        TranscriptionConfig::new(&self.engine, &self.model, &self.language)
    }

    /// `Pending -> Processing`. Any other starting state is left alone.
    pub fn start_processing(&mut self) -> bool {
        if self.status != TaskStatus::Pending {
            return false;
        }
        self.status = TaskStatus::Processing;
        self.message = "Processing".to_string();
        true
    }

    /// Applies a progress tick while processing. Progress is clamped to
    /// `[0, 1]` and never moves backwards within a run.
    pub fn record_progress(&mut self, progress: f32, message: Option<&str>) -> bool {
        if self.status != TaskStatus::Processing {
            return false;
        }
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            self.progress
        };
        self.progress = self.progress.max(progress);
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            self.message = message.to_string();
        }
        true
    }

    pub fn complete(&mut self, result: Transcript) {
        self.status = TaskStatus::Completed;
        self.progress = 1.0;
        self.message = "Transcription completed".to_string();
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed;
        self.message = format!("Failed: {}", error);
        self.result = None;
        self.error = Some(error.to_string());
    }

    /// `{Completed, Failed} -> Pending` with a possibly different configuration.
    /// Keeps the media; drops the result, the error and the run's waveform.
    pub fn reset(&mut self, config: TranscriptionConfig) -> bool {
        if self.status.is_active() {
            return false;
        }
        self.engine = config.engine;
        self.model = config.model;
        self.language = config.language;
        self.status = TaskStatus::Pending;
        self.progress = 0.0;
        self.message = "Waiting to be re-transcribed".to_string();
        self.result = None;
        self.error = None;
        self.completed_at = None;
        self.wav_path = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TranscriptSegment;

    fn pending_task() -> Task {
        Task::new(
            TaskId::new(),
            "talk.wav".to_string(),
            TranscriptionConfig::new("whisper", "base", "auto"),
            PathBuf::from("/tmp/media.wav"),
        )
    }

    fn transcript() -> Transcript {
        Transcript::new(vec![TranscriptSegment::new(0.0, 1.0, "hi")], "en", "test")
    }

    #[test]
    fn given_new_task_when_created_then_pending_with_zero_progress() {
        let task = pending_task();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0.0);
        assert!(task.result.is_none() && task.error.is_none());
    }

    #[test]
    fn given_pending_task_when_progress_reported_then_ignored() {
        let mut task = pending_task();
        assert!(!task.record_progress(0.5, Some("x")));
        assert_eq!(task.progress, 0.0);
    }

    #[test]
    fn given_processing_task_when_progress_goes_backwards_then_it_holds() {
        let mut task = pending_task();
        task.start_processing();
        task.record_progress(0.6, Some("later"));
        task.record_progress(0.2, None);
        assert_eq!(task.progress, 0.6);
        assert_eq!(task.message, "later");
    }

    #[test]
    fn given_completed_task_when_failed_then_result_is_cleared() {
        let mut task = pending_task();
        task.start_processing();
        task.complete(transcript());
        task.fail("boom");
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());
        assert_eq!(task.error.as_deref(), Some("boom"));
    }

    #[test]
    fn given_failed_task_when_completed_then_error_is_cleared() {
        let mut task = pending_task();
        task.fail("boom");
        task.complete(transcript());
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.error.is_none());
        assert_eq!(task.progress, 1.0);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn given_processing_task_when_reset_then_rejected_without_changes() {
        let mut task = pending_task();
        task.start_processing();
        let before = task.clone();
        assert!(!task.reset(TranscriptionConfig::new("openai", "whisper-1", "en")));
        assert_eq!(task, before);
    }

    #[test]
    fn given_completed_task_when_reset_then_pending_with_new_config() {
        let mut task = pending_task();
        task.start_processing();
        task.wav_path = Some(PathBuf::from("/tmp/audio.wav"));
        task.complete(transcript());

        assert!(task.reset(TranscriptionConfig::new("openai", "whisper-1", "en")));
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.engine, "openai");
        assert!(task.result.is_none() && task.completed_at.is_none() && task.wav_path.is_none());
        assert_eq!(task.media_path, PathBuf::from("/tmp/media.wav"));
    }

    #[test]
    fn given_auto_or_blank_language_when_hinting_then_none() {
        assert_eq!(language_hint("auto"), None);
        assert_eq!(language_hint(" "), None);
        assert_eq!(language_hint("zh"), Some("zh"));
    }
}
