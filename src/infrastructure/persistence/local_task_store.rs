use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::instrument;

use crate::application::ports::{TaskStore, TaskStoreError};
use crate::domain::{Task, TaskId, Transcript, TranscriptionConfig};

use super::history_loader::load_history;
use super::task_record::{
    TaskLayout, TaskMeta, partial_path, remove_file_if_exists, same_file, write_json_atomic,
};

/// Task store backed by one directory per task.
///
/// A single mutex guards the map; every state transition writes its records
/// while holding it, so no caller ever observes a torn task. Bulk copies of
/// media and waveforms happen outside the lock.
pub struct LocalTaskStore {
    layout: TaskLayout,
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl LocalTaskStore {
    /// Creates the directories if needed and restores every task found on disk.
    pub async fn open(
        history_dir: PathBuf,
        legacy_results_dir: Option<PathBuf>,
    ) -> Result<Self, TaskStoreError> {
        tokio::fs::create_dir_all(&history_dir).await?;
        if let Some(dir) = &legacy_results_dir {
            tokio::fs::create_dir_all(dir).await?;
        }

        let layout = TaskLayout::new(history_dir, legacy_results_dir);
        let tasks = load_history(&layout).await;

        Ok(Self {
            layout,
            tasks: Mutex::new(tasks),
        })
    }

    async fn write_meta(&self, task: &Task) -> Result<(), TaskStoreError> {
        write_json_atomic(&self.layout.meta_path(task.id), &TaskMeta::from(task)).await
    }

    async fn write_result(&self, id: TaskId, result: &Transcript) -> Result<(), TaskStoreError> {
        write_json_atomic(&self.layout.result_path(id), result).await?;

        if let Some(mirror) = self.layout.legacy_result_path(id) {
            if let Err(e) = write_json_atomic(&mirror, result).await {
                tracing::warn!(task_id = %id, error = %e, "Failed to write legacy result mirror");
            }
        }
        Ok(())
    }

    async fn remove_legacy_result(&self, id: TaskId) {
        if let Some(mirror) = self.layout.legacy_result_path(id) {
            if let Err(e) = remove_file_if_exists(&mirror).await {
                tracing::warn!(task_id = %id, error = %e, "Failed to remove legacy result mirror");
            }
        }
    }
}

#[async_trait]
impl TaskStore for LocalTaskStore {
    #[instrument(skip(self, config, source_path), fields(engine = %config.engine))]
    async fn create_task(
        &self,
        filename: &str,
        config: TranscriptionConfig,
        source_path: &Path,
    ) -> Result<TaskId, TaskStoreError> {
        let id = TaskId::new();
        let task_dir = self.layout.task_dir(id);
        tokio::fs::create_dir_all(&task_dir).await?;

        let media_path = self.layout.media_path(id, source_path);
        if !same_file(source_path, &media_path).await {
            if let Err(e) = tokio::fs::copy(source_path, &media_path).await {
                let _ = tokio::fs::remove_dir_all(&task_dir).await;
                return Err(e.into());
            }
        }

        let task = Task::new(id, filename.to_string(), config, media_path);

        let mut tasks = self.tasks.lock().await;
        if let Err(e) = self.write_meta(&task).await {
            drop(tasks);
            let _ = tokio::fs::remove_dir_all(&task_dir).await;
            return Err(e);
        }
        tasks.insert(id, task);

        tracing::info!(task_id = %id, "Task created");
        Ok(id)
    }

    async fn get_task(&self, id: TaskId) -> Option<Task> {
        self.tasks.lock().await.get(&id).cloned()
    }

    async fn list_tasks(&self) -> Vec<Task> {
        let mut tasks: Vec<Task> = self.tasks.lock().await.values().cloned().collect();
        tasks.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });
        tasks
    }

    async fn update_progress(&self, id: TaskId, progress: f32, message: Option<&str>) {
        if let Some(task) = self.tasks.lock().await.get_mut(&id) {
            task.record_progress(progress, message);
        }
    }

    async fn mark_processing(&self, id: TaskId) -> bool {
        match self.tasks.lock().await.get_mut(&id) {
            Some(task) => task.start_processing(),
            None => false,
        }
    }

    #[instrument(skip(self, result), fields(task_id = %id, segments = result.segments.len()))]
    async fn complete_task(&self, id: TaskId, result: Transcript) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;

        let mut updated = task.clone();
        updated.complete(result);

        if let Some(transcript) = &updated.result {
            self.write_result(id, transcript).await?;
        }
        self.write_meta(&updated).await?;

        *task = updated;
        tracing::info!("Task completed");
        Ok(())
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn fail_task(&self, id: TaskId, error: &str) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;

        // The failure must be visible even if the write below does not land.
        task.fail(error);
        let snapshot = task.clone();
        self.write_meta(&snapshot).await?;

        tracing::info!("Task failed");
        Ok(())
    }

    #[instrument(skip(self, config), fields(task_id = %id, engine = %config.engine))]
    async fn reset_for_retranscribe(
        &self,
        id: TaskId,
        config: TranscriptionConfig,
    ) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;

        let mut updated = task.clone();
        if !updated.reset(config) {
            return Err(TaskStoreError::TaskBusy(id, task.status));
        }
        self.write_meta(&updated).await?;
        *task = updated;

        for stale in [self.layout.result_path(id), self.layout.wav_path(id)] {
            if let Err(e) = remove_file_if_exists(&stale).await {
                tracing::warn!(error = %e, path = %stale.display(), "Failed to remove stale artifact");
            }
        }
        self.remove_legacy_result(id).await;

        tracing::info!("Task reset for re-transcription");
        Ok(())
    }

    #[instrument(skip(self, temp_wav), fields(task_id = %id))]
    async fn persist_wav(&self, id: TaskId, temp_wav: &Path) -> Result<PathBuf, TaskStoreError> {
        if !self.tasks.lock().await.contains_key(&id) {
            return Err(TaskStoreError::NotFound(id));
        }

        let destination = self.layout.wav_path(id);
        let scratch = if same_file(temp_wav, &destination).await {
            None
        } else {
            let scratch = partial_path(&destination);
            if let Err(e) = tokio::fs::copy(temp_wav, &scratch).await {
                let _ = remove_file_if_exists(&scratch).await;
                return Err(e.into());
            }
            Some(scratch)
        };

        let mut tasks = self.tasks.lock().await;
        let Some(task) = tasks.get_mut(&id) else {
            if let Some(scratch) = &scratch {
                let _ = remove_file_if_exists(scratch).await;
            }
            return Err(TaskStoreError::NotFound(id));
        };

        if let Some(scratch) = &scratch {
            if let Err(e) = tokio::fs::rename(scratch, &destination).await {
                let _ = remove_file_if_exists(scratch).await;
                return Err(e.into());
            }
        }
        task.wav_path = Some(destination.clone());

        tracing::debug!(path = %destination.display(), "Waveform persisted");
        Ok(destination)
    }

    #[instrument(skip(self, text), fields(task_id = %id))]
    async fn edit_segment(
        &self,
        id: TaskId,
        index: usize,
        text: &str,
    ) -> Result<(), TaskStoreError> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))?;
        let current = task.result.as_ref().ok_or(TaskStoreError::NoResult(id))?;

        let mut edited = current.clone();
        if !edited.edit_segment_text(index, text) {
            return Err(TaskStoreError::SegmentOutOfRange {
                index,
                len: current.segments.len(),
            });
        }

        self.write_result(id, &edited).await?;
        task.result = Some(edited);
        Ok(())
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete_task(&self, id: TaskId) -> bool {
        let mut tasks = self.tasks.lock().await;
        if tasks.remove(&id).is_none() {
            return false;
        }

        let task_dir = self.layout.task_dir(id);
        match tokio::fs::remove_dir_all(&task_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %task_dir.display(), "Failed to remove task directory");
            }
        }
        self.remove_legacy_result(id).await;

        tracing::info!("Task deleted");
        true
    }
}
