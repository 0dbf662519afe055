pub mod audio_decoder;
#[cfg(feature = "local-whisper")]
mod candle_whisper_engine;
mod ffmpeg_normalizer;
mod native_normalizer;
mod normalizer_factory;
mod openai_whisper_engine;
mod transcription_engine_factory;

#[cfg(feature = "local-whisper")]
pub use candle_whisper_engine::CandleWhisperEngine;
pub use ffmpeg_normalizer::{FfmpegNormalizer, locate_ffmpeg};
pub use native_normalizer::NativeNormalizer;
pub use normalizer_factory::{NormalizerFactory, NormalizerKind};
pub use openai_whisper_engine::OpenAiWhisperEngine;
pub use transcription_engine_factory::{
    EngineOptions, TranscriptionEngineFactory, TranscriptionProvider,
};
