mod media_format;
mod task;
mod task_id;
mod task_status;
mod transcript;

pub use media_format::{
    MediaFormat, MediaKind, SUPPORTED_AUDIO_EXTENSIONS, SUPPORTED_VIDEO_EXTENSIONS,
};
pub use task::{Task, TranscriptionConfig, language_hint};
pub use task_id::TaskId;
pub use task_status::TaskStatus;
pub use transcript::{Transcript, TranscriptSegment};
