use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::ApiBuilder;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tokio::sync::Mutex;

use crate::application::ports::{
    ModelInfo, ProgressReporter, TranscriptionEngine, TranscriptionError,
};
use crate::domain::{Transcript, TranscriptSegment};

use super::audio_decoder::{self, TARGET_SAMPLE_RATE};

pub const ENGINE_NAME: &str = "whisper";
const DEFAULT_MODEL: &str = "base";
const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";
const MAX_TOKENS_PER_CHUNK: usize = 224;

const MODELS: &[(&str, &str, &str, &str)] = &[
    ("tiny", "Tiny", "openai/whisper-tiny", "Fastest, lowest accuracy"),
    ("base", "Base", "openai/whisper-base", "Fast with basic accuracy"),
    ("small", "Small", "openai/whisper-small", "Balanced speed and accuracy"),
    ("medium", "Medium", "openai/whisper-medium", "High accuracy, needs a few GB of RAM"),
    ("large-v3", "Large v3", "openai/whisper-large-v3", "Best accuracy, slowest on CPU"),
];

const LANGUAGES: &[&str] = &[
    "en", "zh", "de", "es", "ru", "ko", "fr", "ja", "pt", "tr", "pl", "ca", "nl", "ar", "sv",
    "it", "id", "hi", "fi", "vi", "he", "uk", "el", "ms", "cs", "ro", "da", "hu", "ta", "no",
    "th", "ur", "hr", "bg", "lt", "la", "mi", "ml", "cy", "sk", "te", "fa", "lv", "bn", "sr",
    "az", "sl", "kn", "et", "mk", "br", "eu", "is", "hy", "ne", "mn", "bs", "kk", "sq", "sw",
    "gl", "mr", "pa", "si", "km", "sn", "yo", "so", "af", "oc", "ka", "be", "tg", "sd", "gu",
    "am", "yi", "lo", "uz", "fo", "ht", "ps", "tk", "nn", "mt", "sa", "lb", "my", "bo", "tl",
    "mg", "as", "tt", "haw", "ln", "ha", "ba", "jw", "su", "yue",
];

struct LoadedWhisper {
    model: m::model::Whisper,
    tokenizer: Tokenizer,
    config: Config,
    mel_filters: Vec<f32>,
}

struct DecodedChunk {
    text: String,
    confidence: f64,
}

/// Whisper running in-process on candle. Models are fetched from the
/// Hugging Face hub on first use and kept for the lifetime of the engine.
pub struct CandleWhisperEngine {
    device: Device,
    cache_dir: Option<PathBuf>,
    models: Mutex<HashMap<String, Arc<std::sync::Mutex<LoadedWhisper>>>>,
}

impl CandleWhisperEngine {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self {
            device: Device::Cpu,
            cache_dir,
            models: Mutex::new(HashMap::new()),
        }
    }

    /// Loads at most one model at a time; concurrent callers for the same
    /// model wait for the first load and then share it.
    async fn model(
        &self,
        model: &str,
    ) -> Result<Arc<std::sync::Mutex<LoadedWhisper>>, TranscriptionError> {
        let repo_id = MODELS
            .iter()
            .find(|(id, ..)| *id == model)
            .map(|(_, _, repo, _)| repo.to_string())
            .ok_or_else(|| TranscriptionError::UnknownModel(model.to_string()))?;

        let mut models = self.models.lock().await;
        if let Some(loaded) = models.get(model) {
            return Ok(Arc::clone(loaded));
        }

        tracing::info!(model = %model, repo = %repo_id, "Loading Whisper model");
        let device = self.device.clone();
        let cache_dir = self.cache_dir.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            LoadedWhisper::load(&repo_id, &device, cache_dir)
        })
        .await
        .map_err(|e| TranscriptionError::ModelLoadFailed(format!("loader task: {}", e)))??;

        let loaded = Arc::new(std::sync::Mutex::new(loaded));
        models.insert(model.to_string(), Arc::clone(&loaded));
        tracing::info!(model = %model, "Whisper model loaded");
        Ok(loaded)
    }
}

#[async_trait]
impl TranscriptionEngine for CandleWhisperEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn display_name(&self) -> &str {
        "Whisper (local)"
    }

    fn description(&self) -> &str {
        "OpenAI Whisper running locally on candle, multilingual"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn requirement(&self) -> &str {
        "a build with the local-whisper feature"
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        MODELS
            .iter()
            .map(|(id, name, _, description)| ModelInfo::new(id, name, description))
            .collect()
    }

    #[tracing::instrument(skip(self, progress), fields(audio = %audio_path.display()))]
    async fn transcribe(
        &self,
        audio_path: &Path,
        model: &str,
        language: Option<&str>,
        progress: ProgressReporter,
    ) -> Result<Transcript, TranscriptionError> {
        let model = if model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            model.trim()
        };

        progress.report(0.1, "Loading Whisper model");
        let loaded = self.model(model).await?;
        progress.report(0.3, "Model ready, transcribing");

        let path = audio_path.to_path_buf();
        let device = self.device.clone();
        let language = language.map(str::to_string);
        let engine_label = format!("{}-{}", ENGINE_NAME, model);

        tokio::task::spawn_blocking(move || {
            let pcm = audio_decoder::read_wav(&path)
                .map_err(|e| TranscriptionError::DecodingFailed(e.to_string()))?;
            let mut whisper = loaded.lock().map_err(|_| {
                TranscriptionError::TranscriptionFailed("model state poisoned".to_string())
            })?;
            transcribe_pcm(
                &mut whisper,
                &device,
                &pcm,
                language.as_deref(),
                &progress,
                &engine_label,
            )
        })
        .await
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("worker task: {}", e)))?
    }
}

impl LoadedWhisper {
    fn load(
        repo_id: &str,
        device: &Device,
        cache_dir: Option<PathBuf>,
    ) -> Result<Self, TranscriptionError> {
        let mut builder = ApiBuilder::new();
        if let Some(dir) = cache_dir {
            builder = builder.with_cache_dir(dir);
        }
        let api = builder
            .build()
            .map_err(|e| TranscriptionError::ModelLoadFailed(e.to_string()))?;
        let repo = api.repo(Repo::new(repo_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("config.json: {}", e)))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer.json: {}", e)))?;
        let weights_path = repo.get("model.safetensors").map_err(|e| {
            TranscriptionError::ModelLoadFailed(format!("model.safetensors: {}", e))
        })?;

        let config_contents = std::fs::read_to_string(&config_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_contents)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("parse config: {}", e)))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("tokenizer: {}", e)))?;

        let mel_file = if config.num_mel_bins == 128 {
            "melfilters128.bytes"
        } else {
            "melfilters.bytes"
        };
        let mel_repo = api.repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model));
        let mel_bytes_path = mel_repo
            .get(mel_file)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("{}: {}", mel_file, e)))?;
        let mel_bytes = std::fs::read(&mel_bytes_path)
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("mel filters: {}", e)))?;
        let mel_filters = read_mel_filters(&mel_bytes, &config)?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, device)
                .map_err(|e| TranscriptionError::ModelLoadFailed(format!("weights: {}", e)))?
        };

        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| TranscriptionError::ModelLoadFailed(format!("model: {}", e)))?;

        Ok(Self {
            model,
            tokenizer,
            config,
            mel_filters,
        })
    }
}

/// One segment per 30 second window; Whisper's own window size.
fn transcribe_pcm(
    whisper: &mut LoadedWhisper,
    device: &Device,
    pcm: &[f32],
    language: Option<&str>,
    progress: &ProgressReporter,
    engine_label: &str,
) -> Result<Transcript, TranscriptionError> {
    let chunk_samples = m::N_SAMPLES;
    let total_secs = pcm.len() as f64 / TARGET_SAMPLE_RATE as f64;
    let chunk_secs = chunk_samples as f64 / TARGET_SAMPLE_RATE as f64;
    let chunk_count = pcm.len().div_ceil(chunk_samples).max(1);

    let mut language_code = language.map(str::to_string);
    let mut segments = Vec::new();

    for (i, chunk) in pcm.chunks(chunk_samples).enumerate() {
        let mel = mel_tensor(whisper, device, chunk)?;
        let features = whisper
            .model
            .encoder
            .forward(&mel, true)
            .map_err(|e| TranscriptionError::TranscriptionFailed(format!("encoder: {}", e)))?;

        if language_code.is_none() {
            let detected = detect_language(whisper, device, &features)?;
            tracing::debug!(language = %detected, "Detected spoken language");
            language_code = Some(detected);
        }

        let decoded = decode_chunk(whisper, device, &features, language_code.as_deref())?;
        tracing::debug!(chunk = i, chars = decoded.text.len(), "Audio window decoded");

        if !decoded.text.is_empty() {
            let start = i as f64 * chunk_secs;
            let end = ((i + 1) as f64 * chunk_secs).min(total_secs);
            segments.push(
                TranscriptSegment::new(start, end, decoded.text).with_confidence(decoded.confidence),
            );
        }

        progress.report(
            0.3 + 0.6 * (i + 1) as f32 / chunk_count as f32,
            format!("Transcribed {}/{} windows", i + 1, chunk_count),
        );
    }

    Ok(Transcript::new(
        segments,
        language_code.unwrap_or_else(|| "auto".to_string()),
        engine_label,
    ))
}

fn mel_tensor(
    whisper: &LoadedWhisper,
    device: &Device,
    chunk: &[f32],
) -> Result<Tensor, TranscriptionError> {
    let mut samples = chunk.to_vec();
    samples.resize(m::N_SAMPLES, 0.0);

    let mel_data = m::audio::pcm_to_mel(&whisper.config, &samples, &whisper.mel_filters);
    let n_mel = whisper.config.num_mel_bins;
    let n_frames = mel_data.len() / n_mel;

    Tensor::from_vec(mel_data, (1, n_mel, n_frames), device)
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("mel tensor: {}", e)))
}

/// Logits for the token following `tokens`.
fn next_logits(
    whisper: &mut LoadedWhisper,
    device: &Device,
    features: &Tensor,
    tokens: &[u32],
    flush_cache: bool,
) -> Result<Tensor, TranscriptionError> {
    let fail = |e: candle_core::Error| TranscriptionError::TranscriptionFailed(e.to_string());

    let token_tensor = Tensor::new(tokens, device)
        .map_err(fail)?
        .unsqueeze(0)
        .map_err(fail)?;
    let output = whisper
        .model
        .decoder
        .forward(&token_tensor, features, flush_cache)
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("decoder: {}", e)))?;
    let logits = whisper
        .model
        .decoder
        .final_linear(&output.squeeze(0).map_err(fail)?)
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("linear: {}", e)))?;
    let seq_len = logits.dim(0).map_err(fail)?;
    logits.get(seq_len - 1).map_err(fail)
}

fn detect_language(
    whisper: &mut LoadedWhisper,
    device: &Device,
    features: &Tensor,
) -> Result<String, TranscriptionError> {
    let fail = |e: candle_core::Error| TranscriptionError::TranscriptionFailed(e.to_string());
    let sot = token_id(&whisper.tokenizer, m::SOT_TOKEN)?;

    let logits = next_logits(whisper, device, features, &[sot], true)?;
    let logits: Vec<f32> = logits.to_vec1().map_err(fail)?;

    let detected = LANGUAGES
        .iter()
        .filter_map(|code| {
            let id = whisper.tokenizer.token_to_id(&format!("<|{}|>", code))?;
            logits.get(id as usize).map(|score| (*code, *score))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(code, _)| code.to_string())
        .unwrap_or_else(|| "en".to_string());

    whisper.model.reset_kv_cache();
    Ok(detected)
}

fn decode_chunk(
    whisper: &mut LoadedWhisper,
    device: &Device,
    features: &Tensor,
    language: Option<&str>,
) -> Result<DecodedChunk, TranscriptionError> {
    let fail = |e: candle_core::Error| TranscriptionError::TranscriptionFailed(e.to_string());

    let mut tokens = vec![token_id(&whisper.tokenizer, m::SOT_TOKEN)?];
    if let Some(language) = language {
        let language_token = whisper
            .tokenizer
            .token_to_id(&format!("<|{}|>", language))
            .ok_or_else(|| {
                TranscriptionError::TranscriptionFailed(format!(
                    "language '{}' is not supported by Whisper",
                    language
                ))
            })?;
        tokens.push(language_token);
    }
    tokens.push(token_id(&whisper.tokenizer, m::TRANSCRIBE_TOKEN)?);
    tokens.push(token_id(&whisper.tokenizer, m::NO_TIMESTAMPS_TOKEN)?);
    let eot = token_id(&whisper.tokenizer, m::EOT_TOKEN)?;
    let prompt_len = tokens.len();

    let mut log_prob_sum = 0.0_f64;
    for step in 0..MAX_TOKENS_PER_CHUNK {
        let logits = next_logits(whisper, device, features, &tokens, step == 0)?;
        let next_token = logits
            .argmax(0)
            .map_err(fail)?
            .to_scalar::<u32>()
            .map_err(fail)?;
        if next_token == eot {
            break;
        }

        let probs = candle_nn::ops::softmax(&logits, 0).map_err(fail)?;
        let prob = probs
            .get(next_token as usize)
            .map_err(fail)?
            .to_scalar::<f32>()
            .map_err(fail)?;
        log_prob_sum += (prob.max(f32::MIN_POSITIVE) as f64).ln();
        tokens.push(next_token);
    }
    whisper.model.reset_kv_cache();

    let generated = &tokens[prompt_len..];
    let text = whisper
        .tokenizer
        .decode(generated, true)
        .map_err(|e| TranscriptionError::TranscriptionFailed(format!("detokenize: {}", e)))?;
    let confidence = if generated.is_empty() {
        0.0
    } else {
        (log_prob_sum / generated.len() as f64).exp()
    };

    Ok(DecodedChunk {
        text: text.trim().to_string(),
        confidence,
    })
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, TranscriptionError> {
    tokenizer.token_to_id(token).ok_or_else(|| {
        TranscriptionError::TranscriptionFailed(format!("token not found: {}", token))
    })
}

fn read_mel_filters(bytes: &[u8], config: &Config) -> Result<Vec<f32>, TranscriptionError> {
    let expected_len = config.num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(TranscriptionError::ModelLoadFailed(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    let filters: Vec<f32> = bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    Ok(filters)
}
