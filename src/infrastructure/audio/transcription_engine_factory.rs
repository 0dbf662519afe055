use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::{TranscriptionEngine, TranscriptionError};
use crate::application::services::EngineRegistry;

#[cfg(feature = "local-whisper")]
use super::candle_whisper_engine::CandleWhisperEngine;
use super::openai_whisper_engine::OpenAiWhisperEngine;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TranscriptionProvider {
    Local,
    OpenAi,
}

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub local_whisper_enabled: bool,
    pub model_cache_dir: Option<PathBuf>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_models: Vec<String>,
}

pub struct TranscriptionEngineFactory;

impl TranscriptionEngineFactory {
    pub fn create(
        provider: TranscriptionProvider,
        options: &EngineOptions,
    ) -> Result<Arc<dyn TranscriptionEngine>, TranscriptionError> {
        match provider {
            TranscriptionProvider::Local => Self::create_local(options),
            TranscriptionProvider::OpenAi => Ok(Arc::new(OpenAiWhisperEngine::new(
                options.openai_api_key.clone(),
                options.openai_base_url.clone(),
                options.openai_models.clone(),
            ))),
        }
    }

    /// The remote engine is always listed so the UI can show what it needs;
    /// the local one only when enabled.
    pub fn build_registry(options: &EngineOptions) -> EngineRegistry {
        let mut providers = vec![TranscriptionProvider::OpenAi];
        if options.local_whisper_enabled {
            providers.insert(0, TranscriptionProvider::Local);
        }

        let mut registry = EngineRegistry::new();
        for provider in providers {
            match Self::create(provider, options) {
                Ok(engine) => {
                    tracing::info!(
                        engine = %engine.name(),
                        available = engine.is_available(),
                        "Transcription engine registered"
                    );
                    registry.register(engine);
                }
                Err(e) => {
                    tracing::warn!(provider = ?provider, error = %e, "Transcription engine skipped")
                }
            }
        }
        registry
    }

    #[cfg(feature = "local-whisper")]
    fn create_local(options: &EngineOptions) -> Result<Arc<dyn TranscriptionEngine>, TranscriptionError> {
        Ok(Arc::new(CandleWhisperEngine::new(
            options.model_cache_dir.clone(),
        )))
    }

    #[cfg(not(feature = "local-whisper"))]
    fn create_local(_options: &EngineOptions) -> Result<Arc<dyn TranscriptionEngine>, TranscriptionError> {
        Err(TranscriptionError::ModelLoadFailed(
            "built without the local-whisper feature".to_string(),
        ))
    }
}
