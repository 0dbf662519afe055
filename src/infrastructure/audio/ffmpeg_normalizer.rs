use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use uuid::Uuid;

use crate::application::ports::{AudioNormalizer, NormalizationError};

use super::audio_decoder::TARGET_SAMPLE_RATE;

const FALLBACK_LOCATIONS: &[&str] = &[
    "/usr/local/bin/ffmpeg",
    "/usr/bin/ffmpeg",
    "/opt/homebrew/bin/ffmpeg",
    r"C:\ffmpeg\bin\ffmpeg.exe",
    r"C:\Program Files\ffmpeg\bin\ffmpeg.exe",
];

const MISSING_HINT: &str = "ffmpeg was not found; install it (macOS: brew install ffmpeg, \
    Debian/Ubuntu: apt install ffmpeg, Windows: https://ffmpeg.org/download.html) \
    or set transcription.ffmpeg_path";

/// Converts any container ffmpeg understands by running it as a child process.
pub struct FfmpegNormalizer {
    ffmpeg: PathBuf,
    scratch_dir: PathBuf,
}

impl FfmpegNormalizer {
    pub fn new(ffmpeg_path: Option<PathBuf>, scratch_dir: PathBuf) -> Self {
        let ffmpeg = ffmpeg_path
            .or_else(locate_ffmpeg)
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        tracing::debug!(ffmpeg = %ffmpeg.display(), "ffmpeg normalizer configured");
        Self {
            ffmpeg,
            scratch_dir,
        }
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    #[tracing::instrument(skip(self), fields(input = %input.display()))]
    async fn normalize(&self, input: &Path) -> Result<PathBuf, NormalizationError> {
        if !tokio::fs::metadata(input).await?.is_file() {
            return Err(NormalizationError::Unsupported(format!(
                "{} is not a file",
                input.display()
            )));
        }

        tokio::fs::create_dir_all(&self.scratch_dir).await?;
        let output = self.scratch_dir.join(format!("{}.wav", Uuid::new_v4().simple()));
        let sample_rate = TARGET_SAMPLE_RATE.to_string();

        let result = Command::new(&self.ffmpeg)
            .arg("-hide_banner")
            .arg("-nostdin")
            .arg("-i")
            .arg(input)
            .args(["-vn", "-acodec", "pcm_s16le", "-ar", sample_rate.as_str(), "-ac", "1", "-y"])
            .arg(&output)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let result = match result {
            Ok(result) => result,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NormalizationError::ToolMissing(MISSING_HINT.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if !result.status.success() {
            let _ = tokio::fs::remove_file(&output).await;
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(NormalizationError::ConversionFailed(format!(
                "ffmpeg exited with {}: {}",
                result.status,
                stderr_tail(&stderr)
            )));
        }

        tracing::debug!(output = %output.display(), "ffmpeg conversion finished");
        Ok(output)
    }
}

/// First match on `PATH`, then the usual install locations.
pub fn locate_ffmpeg() -> Option<PathBuf> {
    let binary = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    std::env::var_os("PATH")
        .into_iter()
        .flat_map(|paths| std::env::split_paths(&paths).collect::<Vec<_>>())
        .map(|dir| dir.join(binary))
        .chain(FALLBACK_LOCATIONS.iter().map(PathBuf::from))
        .find(|candidate| candidate.is_file())
}

/// The last few stderr lines carry the actual ffmpeg diagnosis.
fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(4);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_long_stderr_when_taking_tail_then_only_last_lines_are_kept() {
        let stderr = "banner\n\nline 1\nline 2\nline 3\nInvalid data found\n";

        assert_eq!(
            stderr_tail(stderr),
            "line 1 | line 2 | line 3 | Invalid data found"
        );
    }

    #[tokio::test]
    async fn given_missing_binary_when_normalizing_then_tool_missing_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = dir.path().join("clip.mp3");
        std::fs::write(&input, b"not really audio").unwrap();
        let normalizer = FfmpegNormalizer::new(
            Some(dir.path().join("no-such-ffmpeg")),
            dir.path().join("scratch"),
        );

        let result = normalizer.normalize(&input).await;

        assert!(matches!(result, Err(NormalizationError::ToolMissing(_))));
    }
}
