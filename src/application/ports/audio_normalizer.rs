use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Produces a mono 16 kHz 16-bit PCM WAV from an arbitrary media file.
/// The output is a fresh scratch file owned by the caller.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NormalizationError {
    #[error("{0}")]
    ToolMissing(String),
    #[error("conversion failed: {0}")]
    ConversionFailed(String),
    #[error("unsupported media: {0}")]
    Unsupported(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
