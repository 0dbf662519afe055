use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::application::ports::{AudioNormalizer, TaskStore, TaskStoreError};
use crate::domain::{MediaFormat, Task, TaskId, TaskStatus, TranscriptionConfig};

use super::transcript_export::{self, ExportFormat};
use super::{EngineInfo, EngineRegistry, TranscriptionJob};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Task is {1}, wait for the current run to finish")]
    TaskBusy(TaskId, TaskStatus),
    #[error("Media for task {0} is missing")]
    MediaMissing(TaskId),
    #[error("Transcription worker unavailable")]
    WorkerUnavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TaskStoreError> for ServiceError {
    fn from(e: TaskStoreError) -> Self {
        match e {
            TaskStoreError::NotFound(_) => Self::NotFound("Task not found".to_string()),
            TaskStoreError::TaskBusy(id, status) => Self::TaskBusy(id, status),
            TaskStoreError::NoResult(_) => Self::NotFound("Task has no transcript".to_string()),
            TaskStoreError::SegmentOutOfRange { index, len } => Self::Validation(format!(
                "Segment index {} out of range ({} segments)",
                index, len
            )),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// Where uploads are staged and how large they may get.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub staging_dir: PathBuf,
    pub max_upload_bytes: u64,
}

impl UploadPolicy {
    pub fn new(staging_dir: PathBuf, max_file_size_mb: u64) -> Self {
        Self {
            staging_dir,
            max_upload_bytes: max_file_size_mb.saturating_mul(BYTES_PER_MB),
        }
    }
}

/// Optional overrides submitted with an upload or a retranscribe request.
#[derive(Debug, Clone, Default)]
pub struct TranscriptionRequest {
    pub engine: Option<String>,
    pub model: Option<String>,
    pub language: Option<String>,
}

impl TranscriptionRequest {
    fn resolve(self, fallback: &TranscriptionConfig) -> TranscriptionConfig {
        let pick = |value: Option<String>, default: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        TranscriptionConfig::new(
            pick(self.engine, &fallback.engine),
            pick(self.model, &fallback.model),
            pick(self.language, &fallback.language),
        )
    }
}

/// An upload written to the staging directory. The staged file is removed
/// when this value is dropped.
#[derive(Debug)]
pub struct StagedUpload {
    filename: String,
    path: PathBuf,
    size: u64,
}

impl StagedUpload {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove staged upload")
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlaybackAudio {
    pub path: PathBuf,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct ExportedTranscript {
    pub content: String,
    pub filename: String,
}

/// Entry point for the request path: validates input, owns task creation and
/// hands runs to the background worker.
pub struct TranscriptionService {
    task_store: Arc<dyn TaskStore>,
    engines: Arc<EngineRegistry>,
    normalizer: Arc<dyn AudioNormalizer>,
    sender: mpsc::Sender<TranscriptionJob>,
    upload_policy: UploadPolicy,
    defaults: TranscriptionConfig,
}

impl TranscriptionService {
    pub fn new(
        task_store: Arc<dyn TaskStore>,
        engines: Arc<EngineRegistry>,
        normalizer: Arc<dyn AudioNormalizer>,
        sender: mpsc::Sender<TranscriptionJob>,
        upload_policy: UploadPolicy,
        defaults: TranscriptionConfig,
    ) -> Self {
        Self {
            task_store,
            engines,
            normalizer,
            sender,
            upload_policy,
            defaults,
        }
    }

    /// Streams an upload into the staging directory, rejecting unsupported
    /// extensions before any byte is written and oversized bodies as soon as
    /// they cross the limit.
    pub async fn stage_upload<S, E>(
        &self,
        filename: &str,
        chunks: S,
    ) -> Result<StagedUpload, ServiceError>
    where
        S: Stream<Item = Result<Bytes, E>>,
        E: Display,
    {
        let filename = filename.trim();
        if filename.is_empty() {
            return Err(ServiceError::Validation("No file uploaded".to_string()));
        }
        let format = MediaFormat::from_filename(filename).ok_or_else(|| {
            ServiceError::Validation(format!(
                "Unsupported file format. Supported formats: {}",
                MediaFormat::supported_list()
            ))
        })?;

        tokio::fs::create_dir_all(&self.upload_policy.staging_dir)
            .await
            .map_err(|e| ServiceError::Internal(format!("staging directory: {}", e)))?;

        let path = self
            .upload_policy
            .staging_dir
            .join(format!("{}.{}", Uuid::new_v4(), format.extension()));
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ServiceError::Internal(format!("staging file: {}", e)))?;

        let mut staged = StagedUpload {
            filename: filename.to_string(),
            path,
            size: 0,
        };

        futures::pin_mut!(chunks);
        while let Some(chunk) = chunks.next().await {
            let chunk =
                chunk.map_err(|e| ServiceError::Validation(format!("Failed to read file: {}", e)))?;
            staged.size += chunk.len() as u64;
            if staged.size > self.upload_policy.max_upload_bytes {
                return Err(ServiceError::Validation(format!(
                    "File too large. Maximum size is {} MB",
                    self.upload_policy.max_upload_bytes / BYTES_PER_MB
                )));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ServiceError::Internal(format!("staging write: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| ServiceError::Internal(format!("staging write: {}", e)))?;

        if staged.size == 0 {
            return Err(ServiceError::Validation("Uploaded file is empty".to_string()));
        }

        tracing::debug!(filename = %staged.filename, bytes = staged.size, "Upload staged");
        Ok(staged)
    }

    /// Creates a `Pending` task from a staged upload and queues its first run.
    pub async fn submit(
        &self,
        upload: StagedUpload,
        request: TranscriptionRequest,
    ) -> Result<TaskId, ServiceError> {
        let config = request.resolve(&self.defaults);
        let task_id = self
            .task_store
            .create_task(upload.filename(), config.clone(), upload.path())
            .await?;
        drop(upload);

        let task = self.require_task(task_id).await?;
        tracing::info!(
            task_id = %task_id,
            filename = %task.filename,
            engine = %config.engine,
            model = %config.model,
            "Task created"
        );

        self.dispatch(TranscriptionJob {
            task_id,
            media_path: task.media_path,
            config,
        })
        .await?;
        Ok(task_id)
    }

    /// Resets a finished task and queues a new run. Unset request fields keep
    /// the task's previous settings.
    pub async fn retranscribe(
        &self,
        id: TaskId,
        request: TranscriptionRequest,
    ) -> Result<(), ServiceError> {
        let task = self.require_task(id).await?;
        if task.status.is_active() {
            return Err(ServiceError::TaskBusy(id, task.status));
        }
        if !file_exists(&task.media_path).await {
            return Err(ServiceError::MediaMissing(id));
        }

        let config = request.resolve(&task.config());
        self.task_store
            .reset_for_retranscribe(id, config.clone())
            .await?;
        tracing::info!(task_id = %id, engine = %config.engine, model = %config.model, "Task reset for retranscription");

        self.dispatch(TranscriptionJob {
            task_id: id,
            media_path: task.media_path,
            config,
        })
        .await
    }

    pub async fn get_task(&self, id: TaskId) -> Result<Task, ServiceError> {
        self.require_task(id).await
    }

    pub async fn list_tasks(&self) -> Vec<Task> {
        self.task_store.list_tasks().await
    }

    pub async fn delete_task(&self, id: TaskId) -> Result<(), ServiceError> {
        if self.task_store.delete_task(id).await {
            tracing::info!(task_id = %id, "Task deleted");
            Ok(())
        } else {
            Err(ServiceError::NotFound("Task not found".to_string()))
        }
    }

    pub async fn edit_segment(
        &self,
        id: TaskId,
        index: usize,
        text: &str,
    ) -> Result<(), ServiceError> {
        self.task_store.edit_segment(id, index, text).await?;
        Ok(())
    }

    /// The waveform matching the transcript timestamps, regenerated from the
    /// media copy when it was lost. Falls back to the media itself when no
    /// waveform can be produced.
    pub async fn playback_audio(&self, id: TaskId) -> Result<PlaybackAudio, ServiceError> {
        let task = self.require_task(id).await?;

        if let Some(wav) = &task.wav_path {
            if file_exists(wav).await {
                return Ok(PlaybackAudio {
                    path: wav.clone(),
                    content_type: "audio/wav",
                });
            }
        }

        if !file_exists(&task.media_path).await {
            return Err(ServiceError::MediaMissing(id));
        }

        if !task.status.is_active() {
            if let Some(wav) = self.regenerate_wav(&task).await {
                return Ok(PlaybackAudio {
                    path: wav,
                    content_type: "audio/wav",
                });
            }
        }

        let content_type = MediaFormat::from_path(&task.media_path)
            .map(|f| f.mime_type())
            .unwrap_or("application/octet-stream");
        Ok(PlaybackAudio {
            path: task.media_path,
            content_type,
        })
    }

    pub async fn export(
        &self,
        id: TaskId,
        format: &str,
    ) -> Result<ExportedTranscript, ServiceError> {
        let task = self.require_task(id).await?;
        let transcript = task
            .result
            .as_ref()
            .ok_or_else(|| ServiceError::NotFound("Task has no transcript".to_string()))?;
        let format: ExportFormat = format.parse().map_err(ServiceError::Validation)?;

        let content = transcript_export::render(transcript, format)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        let stem = Path::new(&task.filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("transcript");

        Ok(ExportedTranscript {
            content,
            filename: format!("{}.{}", stem, format.extension()),
        })
    }

    pub fn engines(&self) -> Vec<EngineInfo> {
        self.engines.describe()
    }

    async fn require_task(&self, id: TaskId) -> Result<Task, ServiceError> {
        self.task_store
            .get_task(id)
            .await
            .ok_or_else(|| ServiceError::NotFound("Task not found".to_string()))
    }

    async fn dispatch(&self, job: TranscriptionJob) -> Result<(), ServiceError> {
        let task_id = job.task_id;
        if let Err(e) = self.sender.send(job).await {
            tracing::error!(task_id = %task_id, error = %e, "Failed to enqueue transcription job");
            if let Err(e) = self
                .task_store
                .fail_task(task_id, "transcription worker unavailable")
                .await
            {
                tracing::error!(task_id = %task_id, error = %e, "Could not record dispatch failure");
            }
            return Err(ServiceError::WorkerUnavailable);
        }
        Ok(())
    }

    async fn regenerate_wav(&self, task: &Task) -> Option<PathBuf> {
        let scratch = match self.normalizer.normalize(&task.media_path).await {
            Ok(scratch) => scratch,
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "Could not regenerate playback audio");
                return None;
            }
        };

        let persisted = self.task_store.persist_wav(task.id, &scratch).await;
        if scratch != task.media_path && persisted.as_ref().map_or(true, |p| *p != scratch) {
            if let Err(e) = tokio::fs::remove_file(&scratch).await {
                tracing::warn!(path = %scratch.display(), error = %e, "Failed to remove scratch waveform");
            }
        }

        match persisted {
            Ok(path) => {
                tracing::info!(task_id = %task.id, "Playback audio regenerated");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "Could not persist regenerated audio");
                None
            }
        }
    }
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
