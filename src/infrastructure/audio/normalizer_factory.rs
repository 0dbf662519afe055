use std::path::PathBuf;
use std::sync::Arc;

use crate::application::ports::AudioNormalizer;

use super::ffmpeg_normalizer::FfmpegNormalizer;
use super::native_normalizer::NativeNormalizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizerKind {
    Ffmpeg,
    Native,
}

pub struct NormalizerFactory;

impl NormalizerFactory {
    pub fn create(
        kind: NormalizerKind,
        ffmpeg_path: Option<PathBuf>,
        scratch_dir: PathBuf,
    ) -> Arc<dyn AudioNormalizer> {
        match kind {
            NormalizerKind::Ffmpeg => Arc::new(FfmpegNormalizer::new(ffmpeg_path, scratch_dir)),
            NormalizerKind::Native => Arc::new(NativeNormalizer::new(scratch_dir)),
        }
    }
}
