#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{Notify, mpsc};

use scrivener::application::ports::{
    AudioNormalizer, ModelInfo, NormalizationError, ProgressReporter, TaskStore,
    TranscriptionEngine, TranscriptionError,
};
use scrivener::application::services::{
    EngineRegistry, TranscriptionRunner, TranscriptionService, TranscriptionWorker, UploadPolicy,
};
use scrivener::domain::{Task, TaskId, Transcript, TranscriptSegment, TranscriptionConfig};
use scrivener::infrastructure::persistence::LocalTaskStore;
use scrivener::presentation::config::{
    LocalWhisperSettings, LoggingSettings, NormalizerSetting, OpenAiSettings, ServerSettings,
    Settings, StorageSettings, TranscriptionSettings, UploadSettings,
};
use scrivener::presentation::{AppState, create_router};

pub const TEST_ENGINE: &str = "scripted";
pub const TEST_MAX_UPLOAD_MB: u64 = 1;

enum Script {
    Speak(Vec<(f64, f64, String)>),
    Fail(String),
}

/// Engine that plays back a fixed outcome, optionally holding the run open
/// until released.
pub struct ScriptedEngine {
    name: String,
    available: bool,
    script: Script,
    gate: Option<Arc<Notify>>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    pub fn speaking(name: &str, segments: &[(f64, f64, &str)]) -> Self {
        Self {
            name: name.to_string(),
            available: true,
            script: Script::Speak(
                segments
                    .iter()
                    .map(|(s, e, t)| (*s, *e, t.to_string()))
                    .collect(),
            ),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str, error: &str) -> Self {
        Self {
            script: Script::Fail(error.to_string()),
            ..Self::speaking(name, &[])
        }
    }

    pub fn unavailable(name: &str) -> Self {
        Self {
            available: false,
            ..Self::speaking(name, &[(0.0, 1.0, "never")])
        }
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn display_name(&self) -> &str {
        "Scripted engine"
    }

    fn description(&self) -> &str {
        "Plays back a fixed transcript"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn requirement(&self) -> &str {
        "the scripted-model package"
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::new("tiny", "Tiny", "Scripted model")]
    }

    async fn transcribe(
        &self,
        audio_path: &Path,
        _model: &str,
        language: Option<&str>,
        progress: ProgressReporter,
    ) -> Result<Transcript, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !audio_path.is_file() {
            return Err(TranscriptionError::DecodingFailed(format!(
                "{} does not exist",
                audio_path.display()
            )));
        }

        progress.report(0.5, "Halfway there");
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        match &self.script {
            Script::Speak(segments) => Ok(Transcript::new(
                segments
                    .iter()
                    .map(|(s, e, t)| TranscriptSegment::new(*s, *e, t.as_str()))
                    .collect(),
                language.unwrap_or("en"),
                self.name.as_str(),
            )),
            Script::Fail(error) => Err(TranscriptionError::TranscriptionFailed(error.clone())),
        }
    }
}

/// Copies the input to a fresh scratch file, standing in for a real conversion.
pub struct CopyNormalizer {
    scratch_dir: PathBuf,
    calls: AtomicUsize,
}

impl CopyNormalizer {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self {
            scratch_dir,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioNormalizer for CopyNormalizer {
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let output = self
            .scratch_dir
            .join(format!("{}.wav", uuid::Uuid::new_v4()));
        tokio::fs::copy(input, &output).await?;
        Ok(output)
    }
}

pub struct MissingToolNormalizer;

#[async_trait]
impl AudioNormalizer for MissingToolNormalizer {
    async fn normalize(&self, _input: &Path) -> Result<PathBuf, NormalizationError> {
        Err(NormalizationError::ToolMissing(
            "ffmpeg was not found".to_string(),
        ))
    }
}

pub fn default_config() -> TranscriptionConfig {
    TranscriptionConfig::new(TEST_ENGINE, "tiny", "auto")
}

pub fn write_media(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    std::fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub async fn open_store(data_dir: &Path) -> Arc<LocalTaskStore> {
    Arc::new(
        LocalTaskStore::open(data_dir.join("history"), Some(data_dir.join("results")))
            .await
            .unwrap(),
    )
}

/// Polls until `done` holds for the task, panicking after five seconds.
pub async fn wait_for<F>(store: &dyn TaskStore, id: TaskId, done: F) -> Task
where
    F: Fn(&Task) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(task) = store.get_task(id).await {
            if done(&task) {
                return task;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {} did not reach the expected state in time",
            id
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_terminal(store: &dyn TaskStore, id: TaskId) -> Task {
    wait_for(store, id, |t| t.status.is_terminal()).await
}

pub fn test_settings(data_dir: &Path) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8765,
            static_dir: None,
        },
        storage: StorageSettings {
            data_dir: data_dir.to_string_lossy().into_owned(),
            legacy_results_mirror: true,
        },
        upload: UploadSettings {
            max_file_size_mb: TEST_MAX_UPLOAD_MB,
        },
        transcription: TranscriptionSettings {
            default_engine: TEST_ENGINE.to_string(),
            default_model: "tiny".to_string(),
            default_language: "auto".to_string(),
            normalizer: NormalizerSetting::Native,
            ffmpeg_path: None,
            openai: OpenAiSettings {
                api_key: None,
                base_url: None,
                models: vec![],
            },
            local_whisper: LocalWhisperSettings { enabled: false },
        },
        logging: LoggingSettings {
            level: "info".to_string(),
            enable_json: false,
        },
    }
}

/// Store, background worker, service and router wired over one temp directory.
pub struct TestApp {
    pub dir: TempDir,
    pub store: Arc<LocalTaskStore>,
    pub service: Arc<TranscriptionService>,
    pub normalizer: Arc<CopyNormalizer>,
}

impl TestApp {
    pub async fn start(engines: Vec<Arc<dyn TranscriptionEngine>>) -> Self {
        let dir = TempDir::new().unwrap();
        let settings = test_settings(dir.path());
        let store = open_store(dir.path()).await;
        let normalizer = Arc::new(CopyNormalizer::new(settings.storage.uploads_dir()));

        let mut registry = EngineRegistry::new();
        for engine in engines {
            registry.register(engine);
        }
        let registry = Arc::new(registry);

        let (sender, receiver) = mpsc::channel(16);
        let runner = Arc::new(TranscriptionRunner::new(
            store.clone(),
            Arc::clone(&registry),
            normalizer.clone(),
        ));
        tokio::spawn(TranscriptionWorker::new(receiver, runner).run());

        let service = Arc::new(TranscriptionService::new(
            store.clone(),
            registry,
            normalizer.clone(),
            sender,
            UploadPolicy::new(
                settings.storage.uploads_dir(),
                settings.upload.max_file_size_mb,
            ),
            default_config(),
        ));

        Self {
            dir,
            store,
            service,
            normalizer,
        }
    }

    pub fn router(&self) -> axum::Router {
        create_router(AppState {
            transcription_service: Arc::clone(&self.service),
            settings: test_settings(self.dir.path()),
        })
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.dir.path().join("uploads")
    }

    pub fn history_dir(&self) -> PathBuf {
        self.dir.path().join("history")
    }
}

pub const BOUNDARY: &str = "scrivener-test-boundary";

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, bytes) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(bytes);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}
