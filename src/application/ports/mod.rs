mod audio_normalizer;
mod task_store;
mod transcription_engine;

pub use audio_normalizer::{AudioNormalizer, NormalizationError};
pub use task_store::{TaskStore, TaskStoreError};
pub use transcription_engine::{
    ModelInfo, ProgressReporter, ProgressUpdate, TranscriptionEngine, TranscriptionError,
};
