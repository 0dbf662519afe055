use std::path::Path;

pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] =
    &["mp3", "m4a", "wav", "flac", "ogg", "wma", "aac"];
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm", "flv"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
}

/// A supported upload format, identified by its lowercase file extension.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaFormat {
    extension: String,
    kind: MediaKind,
}

impl MediaFormat {
    pub fn from_filename(filename: &str) -> Option<Self> {
        let extension = Path::new(filename)
            .extension()?
            .to_str()?
            .to_ascii_lowercase();

        let kind = if SUPPORTED_AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            MediaKind::Audio
        } else if SUPPORTED_VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            MediaKind::Video
        } else {
            return None;
        };

        Some(Self { extension, kind })
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_filename(path.file_name()?.to_str()?)
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension.as_str() {
            "mp3" => "audio/mpeg",
            "m4a" => "audio/mp4",
            "wav" => "audio/wav",
            "flac" => "audio/flac",
            "ogg" => "audio/ogg",
            "aac" => "audio/aac",
            "wma" => "audio/x-ms-wma",
            "mp4" => "video/mp4",
            "mkv" => "video/x-matroska",
            "avi" => "video/x-msvideo",
            "mov" => "video/quicktime",
            "webm" => "video/webm",
            "flv" => "video/x-flv",
            _ => "application/octet-stream",
        }
    }

    /// Comma separated list used in validation messages.
    pub fn supported_list() -> String {
        let mut all: Vec<&str> = SUPPORTED_AUDIO_EXTENSIONS
            .iter()
            .chain(SUPPORTED_VIDEO_EXTENSIONS)
            .copied()
            .collect();
        all.sort_unstable();
        all.iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
