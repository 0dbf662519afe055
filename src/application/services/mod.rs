mod engine_registry;
pub mod transcript_export;
mod transcription_runner;
mod transcription_service;
mod transcription_worker;

pub use engine_registry::{EngineInfo, EngineRegistry};
pub use transcript_export::ExportFormat;
pub use transcription_runner::{RunFailure, RunnerError, TranscriptionJob, TranscriptionRunner};
pub use transcription_service::{
    ExportedTranscript, PlaybackAudio, ServiceError, StagedUpload, TranscriptionRequest,
    TranscriptionService, UploadPolicy,
};
pub use transcription_worker::TranscriptionWorker;
