use std::path::{Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::{AudioNormalizer, NormalizationError};

use super::audio_decoder::{self, AudioDecodeError};

/// In-process conversion through symphonia and rubato. Needs no external
/// tools but only handles the containers and codecs symphonia ships.
pub struct NativeNormalizer {
    scratch_dir: PathBuf,
}

impl NativeNormalizer {
    pub fn new(scratch_dir: PathBuf) -> Self {
        Self { scratch_dir }
    }
}

#[async_trait]
impl AudioNormalizer for NativeNormalizer {
    #[tracing::instrument(skip(self), fields(input = %input.display()))]
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizationError> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let output = self
            .scratch_dir
            .join(format!("{}.wav", Uuid::new_v4().simple()));

        let source = input.to_path_buf();
        let target = output.clone();
        let converted = tokio::task::spawn_blocking(move || {
            let samples = audio_decoder::decode_file_to_pcm(&source)?;
            audio_decoder::write_wav(&target, &samples)
        })
        .await
        .map_err(|e| NormalizationError::ConversionFailed(format!("decoder task: {}", e)))?;

        if let Err(e) = converted {
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e.into());
        }

        Ok(output)
    }
}

impl From<AudioDecodeError> for NormalizationError {
    fn from(e: AudioDecodeError) -> Self {
        match e {
            AudioDecodeError::Io(e) => Self::Io(e),
            AudioDecodeError::Probe(_) | AudioDecodeError::Codec(_) => Self::Unsupported(
                format!("{}; configure the ffmpeg normalizer for this format", e),
            ),
            other => Self::ConversionFailed(other.to_string()),
        }
    }
}
