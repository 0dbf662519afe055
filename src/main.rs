use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use scrivener::application::services::{
    TranscriptionRunner, TranscriptionService, TranscriptionWorker, UploadPolicy,
};
use scrivener::domain::TranscriptionConfig;
use scrivener::infrastructure::audio::{
    EngineOptions, NormalizerFactory, NormalizerKind, TranscriptionEngineFactory,
};
use scrivener::infrastructure::observability::{TracingConfig, init_tracing};
use scrivener::infrastructure::persistence::LocalTaskStore;
use scrivener::presentation::config::NormalizerSetting;
use scrivener::presentation::{AppState, Environment, create_router, load_settings};

const JOB_QUEUE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let environment = Environment::from_env().map_err(anyhow::Error::msg)?;

    let settings = load_settings(environment).context("Failed to load settings")?;

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid server address")?;

    init_tracing(
        &TracingConfig::new(
            environment.as_str(),
            settings.logging.enable_json,
            &settings.logging.level,
        ),
        addr,
    );

    let storage = &settings.storage;
    for dir in [storage.uploads_dir(), storage.models_dir()] {
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let legacy_results_dir = storage
        .legacy_results_mirror
        .then(|| storage.results_dir());
    let task_store = Arc::new(
        LocalTaskStore::open(storage.history_dir(), legacy_results_dir)
            .await
            .context("Failed to open task history")?,
    );

    let transcription = &settings.transcription;
    let engines = Arc::new(TranscriptionEngineFactory::build_registry(&EngineOptions {
        local_whisper_enabled: transcription.local_whisper.enabled,
        model_cache_dir: Some(storage.models_dir()),
        openai_api_key: transcription.openai.api_key.clone(),
        openai_base_url: transcription.openai.base_url.clone(),
        openai_models: transcription.openai.models.clone(),
    }));
    if !engines.contains(&transcription.default_engine) {
        tracing::warn!(
            engine = %transcription.default_engine,
            "Default transcription engine is not registered"
        );
    }

    let normalizer_kind = match transcription.normalizer {
        NormalizerSetting::Ffmpeg => NormalizerKind::Ffmpeg,
        NormalizerSetting::Native => NormalizerKind::Native,
    };
    let normalizer = NormalizerFactory::create(
        normalizer_kind,
        transcription.ffmpeg_path.as_ref().map(PathBuf::from),
        storage.uploads_dir(),
    );

    let (job_sender, job_receiver) = mpsc::channel(JOB_QUEUE_CAPACITY);
    let runner = Arc::new(TranscriptionRunner::new(
        task_store.clone(),
        Arc::clone(&engines),
        Arc::clone(&normalizer),
    ));
    tokio::spawn(TranscriptionWorker::new(job_receiver, runner).run());

    let transcription_service = Arc::new(TranscriptionService::new(
        task_store,
        engines,
        normalizer,
        job_sender,
        UploadPolicy::new(storage.uploads_dir(), settings.upload.max_file_size_mb),
        TranscriptionConfig::new(
            &transcription.default_engine,
            &transcription.default_model,
            &transcription.default_language,
        ),
    ));

    let state = AppState {
        transcription_service,
        settings: settings.clone(),
    };
    let router = create_router(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
