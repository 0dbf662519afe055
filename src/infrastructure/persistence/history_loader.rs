//! Rebuilds the in-memory task map from the per-task directories on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::domain::{Task, TaskId, TaskStatus, Transcript};

use super::task_record::{
    MEDIA_STEM, META_FILE, RESULT_FILE, TaskLayout, TaskMeta, WAV_FILE, is_dir, is_file,
};

pub const INTERRUPTED_ERROR: &str = "interrupted: the service stopped before this task finished";
pub const MISSING_RESULT_ERROR: &str = "transcript record is missing or unreadable";
const RESTORED_MESSAGE: &str = "Restored from history";

#[derive(Debug, thiserror::Error)]
pub enum HistoryLoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid meta.json: {0}")]
    InvalidMeta(#[from] serde_json::Error),
    #[error("directory name does not match task id {0}")]
    IdMismatch(TaskId),
}

/// Loads every task directory under the layout's history root. Unreadable
/// entries are logged and skipped; a missing root yields an empty map.
pub async fn load_history(layout: &TaskLayout) -> HashMap<TaskId, Task> {
    let mut tasks = HashMap::new();

    let mut entries = match tokio::fs::read_dir(layout.history_dir()).await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %layout.history_dir().display(),
                "History directory unreadable, starting empty"
            );
            return tasks;
        }
    };

    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read history entry");
                break;
            }
        };

        let dir = entry.path();
        if !is_dir(&dir).await {
            continue;
        }

        match load_task_dir(&dir).await {
            Ok(Some(task)) => {
                tasks.insert(task.id, task);
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %dir.display(), "Skipping history entry");
            }
        }
    }

    tracing::info!(count = tasks.len(), "History loaded");
    tasks
}

/// `Ok(None)` when the directory holds no `meta.json`.
pub async fn load_task_dir(dir: &Path) -> Result<Option<Task>, HistoryLoadError> {
    let meta_path = dir.join(META_FILE);
    if !is_file(&meta_path).await {
        return Ok(None);
    }

    let meta: TaskMeta = serde_json::from_slice(&tokio::fs::read(&meta_path).await?)?;
    if dir.file_name().and_then(|n| n.to_str()) != Some(meta.id.to_string().as_str()) {
        return Err(HistoryLoadError::IdMismatch(meta.id));
    }

    let media_path = locate_media(dir, &meta.media_file).await;
    let wav_candidate = dir.join(WAV_FILE);
    let wav_path = is_file(&wav_candidate).await.then_some(wav_candidate);
    let (result, result_written_at) = load_result(&dir.join(RESULT_FILE), meta.id).await;

    let mut task = Task {
        id: meta.id,
        filename: meta.filename,
        engine: meta.engine,
        model: meta.model,
        language: meta.language,
        media_path,
        wav_path,
        status: meta.status,
        progress: 0.0,
        message: if meta.message.is_empty() {
            RESTORED_MESSAGE.to_string()
        } else {
            meta.message
        },
        result: None,
        error: None,
        created_at: meta.created_at,
        completed_at: meta.completed_at,
    };

    match (meta.status, result) {
        (TaskStatus::Completed, Some(result)) => {
            task.complete(result);
            task.completed_at = meta.completed_at.or(result_written_at);
        }
        (TaskStatus::Pending | TaskStatus::Processing, Some(result)) => {
            tracing::info!(task_id = %task.id, "Recovering finished run whose final status was lost");
            task.complete(result);
            task.completed_at = meta.completed_at.or(result_written_at);
        }
        (TaskStatus::Pending | TaskStatus::Processing, None) => {
            tracing::info!(task_id = %task.id, "Marking interrupted task as failed");
            task.fail(INTERRUPTED_ERROR);
        }
        (TaskStatus::Completed, None) => {
            task.fail(MISSING_RESULT_ERROR);
        }
        (TaskStatus::Failed, _) => {
            let error = meta.error.unwrap_or_else(|| "unknown error".to_string());
            task.fail(&error);
        }
    }

    Ok(Some(task))
}

/// Trusts the recorded path when it still exists, otherwise looks for `media.*`.
async fn locate_media(dir: &Path, recorded: &str) -> PathBuf {
    let recorded_path = PathBuf::from(recorded);
    if !recorded.is_empty() && is_file(&recorded_path).await {
        return recorded_path;
    }

    let mut candidates = Vec::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let is_media = path
                .file_stem()
                .and_then(|s| s.to_str())
                .is_some_and(|stem| stem == MEDIA_STEM);
            if is_media && is_file(&path).await {
                candidates.push(path);
            }
        }
    }
    candidates.sort();

    candidates.into_iter().next().unwrap_or(recorded_path)
}

async fn load_result(path: &Path, id: TaskId) -> (Option<Transcript>, Option<DateTime<Utc>>) {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(_) => return (None, None),
    };

    let written_at = tokio::fs::metadata(path)
        .await
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from);

    match serde_json::from_slice::<Transcript>(&bytes) {
        Ok(result) if !result.is_empty() => (Some(result), written_at),
        Ok(_) => {
            tracing::warn!(task_id = %id, "Ignoring empty transcript record");
            (None, None)
        }
        Err(e) => {
            tracing::warn!(task_id = %id, error = %e, "Ignoring unreadable transcript record");
            (None, None)
        }
    }
}
