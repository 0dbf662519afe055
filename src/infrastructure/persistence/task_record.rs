use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Task, TaskId, TaskStatus};

pub const META_FILE: &str = "meta.json";
pub const RESULT_FILE: &str = "result.json";
pub const WAV_FILE: &str = "audio.wav";
pub const MEDIA_STEM: &str = "media";

/// `meta.json`: every task field except the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskMeta {
    pub id: TaskId,
    #[serde(default = "unknown_filename")]
    pub filename: String,
    #[serde(default)]
    pub engine: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub media_file: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: f32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

fn unknown_filename() -> String {
    "unknown".to_string()
}

impl From<&Task> for TaskMeta {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id,
            filename: task.filename.clone(),
            engine: task.engine.clone(),
            model: task.model.clone(),
            language: task.language.clone(),
            media_file: task.media_path.to_string_lossy().into_owned(),
            status: task.status,
            progress: task.progress,
            message: task.message.clone(),
            error: task.error.clone(),
            created_at: task.created_at,
            completed_at: task.completed_at,
        }
    }
}

/// Where each task's files live. One directory per task id under `history_dir`,
/// plus an optional flat mirror of transcripts for older tooling.
#[derive(Debug, Clone)]
pub struct TaskLayout {
    history_dir: PathBuf,
    legacy_results_dir: Option<PathBuf>,
}

impl TaskLayout {
    pub fn new(history_dir: PathBuf, legacy_results_dir: Option<PathBuf>) -> Self {
        Self {
            history_dir,
            legacy_results_dir,
        }
    }

    pub fn history_dir(&self) -> &Path {
        &self.history_dir
    }

    pub fn task_dir(&self, id: TaskId) -> PathBuf {
        self.history_dir.join(id.to_string())
    }

    pub fn meta_path(&self, id: TaskId) -> PathBuf {
        self.task_dir(id).join(META_FILE)
    }

    pub fn result_path(&self, id: TaskId) -> PathBuf {
        self.task_dir(id).join(RESULT_FILE)
    }

    pub fn wav_path(&self, id: TaskId) -> PathBuf {
        self.task_dir(id).join(WAV_FILE)
    }

    /// `media.<ext>` keeping the upload's extension, lowercased.
    pub fn media_path(&self, id: TaskId, source: &Path) -> PathBuf {
        let name = match source.extension().and_then(|e| e.to_str()) {
            Some(ext) => format!("{}.{}", MEDIA_STEM, ext.to_ascii_lowercase()),
            None => MEDIA_STEM.to_string(),
        };
        self.task_dir(id).join(name)
    }

    pub fn legacy_result_path(&self, id: TaskId) -> Option<PathBuf> {
        self.legacy_results_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", id)))
    }
}

/// Sibling scratch path used to write a file before renaming it into place.
pub fn partial_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{}.{}.partial", name, Uuid::new_v4().simple()))
}

/// Serializes `value` as pretty JSON and renames it over `path`, so a reader
/// sees either the old file or the complete new one.
pub async fn write_json_atomic<T: Serialize>(
    path: &Path,
    value: &T,
) -> Result<(), crate::application::ports::TaskStoreError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    let scratch = partial_path(path);
    if let Err(e) = tokio::fs::write(&scratch, &bytes).await {
        let _ = tokio::fs::remove_file(&scratch).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&scratch, path).await {
        let _ = tokio::fs::remove_file(&scratch).await;
        return Err(e.into());
    }
    Ok(())
}

/// Removes a file, treating "already gone" as success.
pub async fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

pub async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

pub async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

pub async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}
