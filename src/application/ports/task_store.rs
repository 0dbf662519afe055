use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{Task, TaskId, TaskStatus, Transcript, TranscriptionConfig};

/// The authoritative map of tasks and the sole writer of their on-disk records.
///
/// Every method returns copies; nothing handed out aliases the stored state.
/// Terminal transitions are durable once they return `Ok`.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Copies `source_path` into the new task's directory and records it as `Pending`.
    async fn create_task(
        &self,
        filename: &str,
        config: TranscriptionConfig,
        source_path: &Path,
    ) -> Result<TaskId, TaskStoreError>;

    async fn get_task(&self, id: TaskId) -> Option<Task>;

    /// Newest first.
    async fn list_tasks(&self) -> Vec<Task>;

    /// In-memory only.
    async fn update_progress(&self, id: TaskId, progress: f32, message: Option<&str>);

    /// Returns `false` when the task is gone or was not `Pending`.
    async fn mark_processing(&self, id: TaskId) -> bool;

    async fn complete_task(&self, id: TaskId, result: Transcript) -> Result<(), TaskStoreError>;

    async fn fail_task(&self, id: TaskId, error: &str) -> Result<(), TaskStoreError>;

    /// Rejected with [`TaskStoreError::TaskBusy`] while a run is queued or in flight.
    async fn reset_for_retranscribe(
        &self,
        id: TaskId,
        config: TranscriptionConfig,
    ) -> Result<(), TaskStoreError>;

    /// Copies a waveform into the task directory under a fixed name; repeatable.
    async fn persist_wav(&self, id: TaskId, temp_wav: &Path) -> Result<PathBuf, TaskStoreError>;

    async fn edit_segment(&self, id: TaskId, index: usize, text: &str)
    -> Result<(), TaskStoreError>;

    /// Best-effort removal of the task and every artifact it owns.
    /// Returns `false` for an unknown id.
    async fn delete_task(&self, id: TaskId) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("task {0} is {1}")]
    TaskBusy(TaskId, TaskStatus),
    #[error("task {0} has no transcript")]
    NoResult(TaskId),
    #[error("segment index {index} out of range ({len} segments)")]
    SegmentOutOfRange { index: usize, len: usize },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
