use std::path::Path;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use crate::application::ports::{
    ModelInfo, ProgressReporter, TranscriptionEngine, TranscriptionError,
};
use crate::domain::{Transcript, TranscriptSegment};

pub const ENGINE_NAME: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "whisper-1";

/// Whisper behind an OpenAI compatible `/audio/transcriptions` endpoint.
pub struct OpenAiWhisperEngine {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    models: Vec<String>,
}

impl OpenAiWhisperEngine {
    pub fn new(api_key: Option<String>, base_url: Option<String>, models: Vec<String>) -> Self {
        let models: Vec<String> = models
            .into_iter()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: base_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            models: if models.is_empty() {
                vec![DEFAULT_MODEL.to_string()]
            } else {
                models
            },
        }
    }

    fn resolve_model<'a>(&'a self, model: &'a str) -> &'a str {
        if model.trim().is_empty() {
            &self.models[0]
        } else {
            model.trim()
        }
    }
}

#[async_trait]
impl TranscriptionEngine for OpenAiWhisperEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn display_name(&self) -> &str {
        "OpenAI Whisper API"
    }

    fn description(&self) -> &str {
        "Hosted Whisper through an OpenAI compatible transcription endpoint"
    }

    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    fn requirement(&self) -> &str {
        "an API key (set APP__TRANSCRIPTION__OPENAI__API_KEY)"
    }

    fn list_models(&self) -> Vec<ModelInfo> {
        self.models
            .iter()
            .map(|m| ModelInfo::new(m, m, "Remote model"))
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
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            TranscriptionError::ModelLoadFailed(format!("{} requires {}", ENGINE_NAME, self.requirement()))
        })?;
        let model = self.resolve_model(model);
        let url = format!("{}/audio/transcriptions", self.base_url);

        let audio = tokio::fs::read(audio_path)
            .await
            .map_err(|e| TranscriptionError::DecodingFailed(format!("read audio: {}", e)))?;

        let file_part = multipart::Part::bytes(audio)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let mut form = multipart::Form::new()
            .text("model", model.to_string())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", file_part);
        if let Some(language) = language {
            form = form.text("language", language.to_string());
        }

        progress.report(0.2, "Uploading audio");
        tracing::debug!(model = %model, "Sending audio to Whisper API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("body: {}", e)))?;
        progress.report(0.9, "Processing response");

        let transcript = parse_verbose_response(&body, language, &format!("{}-{}", ENGINE_NAME, model))?;

        tracing::info!(
            segments = transcript.segments.len(),
            chars = transcript.full_text.len(),
            "Whisper API transcription completed"
        );

        Ok(transcript)
    }
}

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
}

/// Times in the response are seconds. Confidence is `exp(avg_logprob)`.
fn parse_verbose_response(
    body: &str,
    requested_language: Option<&str>,
    engine_label: &str,
) -> Result<Transcript, TranscriptionError> {
    let parsed: VerboseTranscription = serde_json::from_str(body)
        .map_err(|e| TranscriptionError::ApiRequestFailed(format!("unexpected response: {}", e)))?;

    let mut segments: Vec<TranscriptSegment> = parsed
        .segments
        .iter()
        .filter(|s| !s.text.trim().is_empty())
        .map(|s| {
            let segment = TranscriptSegment::new(s.start, s.end, s.text.as_str());
            match s.avg_logprob {
                Some(logprob) => segment.with_confidence(logprob.exp()),
                None => segment,
            }
        })
        .collect();

    if segments.is_empty() && !parsed.text.trim().is_empty() {
        segments.push(TranscriptSegment::new(
            0.0,
            parsed.duration.unwrap_or(0.0),
            parsed.text.as_str(),
        ));
    }

    let language = parsed
        .language
        .filter(|l| !l.is_empty())
        .or_else(|| requested_language.map(str::to_string))
        .unwrap_or_else(|| "auto".to_string());

    Ok(Transcript::new(segments, language, engine_label))
}
