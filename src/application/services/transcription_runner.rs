use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;

use crate::application::ports::{
    AudioNormalizer, NormalizationError, ProgressReporter, TaskStore, TaskStoreError,
    TranscriptionError,
};
use crate::domain::{TaskId, Transcript, TranscriptionConfig};

use super::EngineRegistry;

/// One queued run: the durable media copy of a task and the settings to use.
#[derive(Debug, Clone)]
pub struct TranscriptionJob {
    pub task_id: TaskId,
    pub media_path: PathBuf,
    pub config: TranscriptionConfig,
}

/// Reasons a run ends with the task marked `Failed`. The display text is
/// what the user sees as the task error.
#[derive(Debug, thiserror::Error)]
pub enum RunFailure {
    #[error("engine '{0}' is not registered")]
    EngineNotRegistered(String),
    #[error("{engine} is not available: {requirement}")]
    EngineUnavailable { engine: String, requirement: String },
    #[error("audio conversion failed: {0}")]
    Normalization(#[from] NormalizationError),
    #[error("{0}")]
    Engine(#[from] TranscriptionError),
    #[error("no speech recognized by {0}")]
    EmptyTranscript(String),
    #[error("could not store the normalized audio: {0}")]
    Persistence(TaskStoreError),
}

/// Raised when the final status write itself did not reach disk.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("completion of task {0} was not durable: {1}")]
    CompletionNotDurable(TaskId, TaskStoreError),
    #[error("failure of task {0} was not durable: {1}")]
    FailureNotDurable(TaskId, TaskStoreError),
}

/// Drives one task through normalizer, engine and task store.
pub struct TranscriptionRunner {
    task_store: Arc<dyn TaskStore>,
    engines: Arc<EngineRegistry>,
    normalizer: Arc<dyn AudioNormalizer>,
}

impl TranscriptionRunner {
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        engines: Arc<EngineRegistry>,
        normalizer: Arc<dyn AudioNormalizer>,
    ) -> Self {
        Self {
            task_store,
            engines,
            normalizer,
        }
    }

    pub fn task_store(&self) -> Arc<dyn TaskStore> {
        Arc::clone(&self.task_store)
    }

    pub async fn run(&self, job: TranscriptionJob) -> Result<(), RunnerError> {
        let span = tracing::info_span!(
            "transcription_run",
            task_id = %job.task_id,
            engine = %job.config.engine,
            model = %job.config.model,
        );
        self.execute(job).instrument(span).await
    }

    async fn execute(&self, job: TranscriptionJob) -> Result<(), RunnerError> {
        let task_id = job.task_id;

        if !self.task_store.mark_processing(task_id).await {
            tracing::warn!("Task is gone or no longer pending, skipping run");
            return Ok(());
        }
        self.task_store
            .update_progress(task_id, 0.05, Some("Preparing transcription"))
            .await;

        let mut scratch_wav = None;
        let outcome = self.transcribe(&job, &mut scratch_wav).await;

        let result = match outcome {
            Ok(transcript) => self.record_completion(task_id, transcript).await,
            Err(RunFailure::Persistence(TaskStoreError::NotFound(_))) => {
                tracing::info!("Task was deleted while running, dropping transcript");
                Ok(())
            }
            Err(failure) => {
                let message = failure.to_string();
                tracing::warn!(error = %message, "Transcription failed");
                self.record_failure(task_id, &message).await
            }
        };

        if let Some(wav) = scratch_wav {
            self.discard_scratch(task_id, &job.media_path, &wav).await;
        }

        result
    }

    async fn transcribe(
        &self,
        job: &TranscriptionJob,
        scratch_wav: &mut Option<PathBuf>,
    ) -> Result<Transcript, RunFailure> {
        let task_id = job.task_id;
        let engine = self
            .engines
            .get(&job.config.engine)
            .ok_or_else(|| RunFailure::EngineNotRegistered(job.config.engine.clone()))?;

        if !engine.is_available() {
            return Err(RunFailure::EngineUnavailable {
                engine: engine.display_name().to_string(),
                requirement: engine.requirement().to_string(),
            });
        }

        self.task_store
            .update_progress(task_id, 0.1, Some("Converting audio"))
            .await;
        let wav = self.normalizer.normalize(&job.media_path).await?;
        *scratch_wav = Some(wav.clone());
        tracing::debug!(wav = %wav.display(), "Audio normalized");

        self.task_store
            .update_progress(task_id, 0.15, Some("Transcribing"))
            .await;

        let (reporter, mut updates) = ProgressReporter::channel();
        let store = Arc::clone(&self.task_store);
        let forwarder = tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                store
                    .update_progress(task_id, update.fraction, Some(&update.message))
                    .await;
            }
        });

        let transcript = engine
            .transcribe(
                &wav,
                &job.config.model,
                job.config.language_hint(),
                reporter,
            )
            .await;
        // Updates arriving after the task leaves Processing are ignored by the store.
        forwarder.abort();

        let transcript = transcript?;
        if transcript.is_empty() {
            return Err(RunFailure::EmptyTranscript(engine.display_name().to_string()));
        }
        tracing::info!(
            segments = transcript.segments.len(),
            language = %transcript.language,
            "Transcription finished"
        );

        self.task_store
            .update_progress(task_id, 0.95, Some("Saving results"))
            .await;
        self.task_store
            .persist_wav(task_id, &wav)
            .await
            .map_err(RunFailure::Persistence)?;

        Ok(transcript)
    }

    async fn record_completion(
        &self,
        task_id: TaskId,
        transcript: Transcript,
    ) -> Result<(), RunnerError> {
        match self.task_store.complete_task(task_id, transcript).await {
            Ok(()) => {
                tracing::info!("Task completed");
                Ok(())
            }
            Err(TaskStoreError::NotFound(_)) => {
                tracing::info!("Task was deleted while running, dropping transcript");
                Ok(())
            }
            Err(e) => {
                let message = format!("could not persist transcript: {}", e);
                if let Err(fail_err) = self.task_store.fail_task(task_id, &message).await {
                    tracing::error!(error = %fail_err, "Could not record failure after completion error");
                }
                Err(RunnerError::CompletionNotDurable(task_id, e))
            }
        }
    }

    async fn record_failure(&self, task_id: TaskId, message: &str) -> Result<(), RunnerError> {
        match self.task_store.fail_task(task_id, message).await {
            Ok(()) | Err(TaskStoreError::NotFound(_)) => Ok(()),
            Err(e) => Err(RunnerError::FailureNotDurable(task_id, e)),
        }
    }

    /// Removes the scratch waveform unless the task owns that very file.
    async fn discard_scratch(&self, task_id: TaskId, media_path: &Path, wav: &Path) {
        if same_file(wav, media_path).await {
            return;
        }
        let persisted = self
            .task_store
            .get_task(task_id)
            .await
            .and_then(|task| task.wav_path);
        if let Some(persisted) = persisted {
            if same_file(wav, &persisted).await {
                return;
            }
        }

        match tokio::fs::remove_file(wav).await {
            Ok(()) => tracing::debug!(wav = %wav.display(), "Scratch waveform removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(wav = %wav.display(), error = %e, "Failed to remove scratch waveform")
            }
        }
    }
}

async fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
