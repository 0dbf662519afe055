use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub const TARGET_SAMPLE_RATE: u32 = 16_000;

#[derive(Debug, thiserror::Error)]
pub enum AudioDecodeError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported container: {0}")]
    Probe(String),
    #[error("no audio track found")]
    NoAudioTrack,
    #[error("unsupported codec: {0}")]
    Codec(String),
    #[error("decode: {0}")]
    Decode(String),
    #[error("no audio samples decoded")]
    Empty,
    #[error("resample: {0}")]
    Resample(String),
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    #[error("expected mono {TARGET_SAMPLE_RATE} Hz wav, got {channels} channel(s) at {sample_rate} Hz")]
    NotCanonical { channels: u16, sample_rate: u32 },
}

/// Decodes the first audio track of a media file into mono 16 kHz samples.
/// Blocking; run it off the async runtime.
pub fn decode_file_to_pcm(path: &Path) -> Result<Vec<f32>, AudioDecodeError> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioDecodeError::Probe(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or(AudioDecodeError::NoAudioTrack)?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let source_rate = codec_params
        .sample_rate
        .ok_or(AudioDecodeError::NoAudioTrack)?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioDecodeError::Codec(e.to_string()))?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(AudioDecodeError::Decode(format!("packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(e)) => {
                tracing::warn!(error = %e, "Skipping corrupt audio frame");
                continue;
            }
            Err(e) => return Err(AudioDecodeError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();
        if num_frames == 0 {
            continue;
        }
        let channels = spec.channels.count().max(1);

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            for frame in samples.chunks(channels) {
                all_samples.push(frame.iter().sum::<f32>() / channels as f32);
            }
        } else {
            all_samples.extend_from_slice(samples);
        }
    }

    if all_samples.is_empty() {
        return Err(AudioDecodeError::Empty);
    }

    if source_rate != TARGET_SAMPLE_RATE {
        all_samples = resample(&all_samples, source_rate, TARGET_SAMPLE_RATE)?;
    }

    tracing::debug!(
        samples = all_samples.len(),
        duration_secs = all_samples.len() as f32 / TARGET_SAMPLE_RATE as f32,
        "Audio decoded to 16kHz mono PCM"
    );

    Ok(all_samples)
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioDecodeError> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| AudioDecodeError::Resample(format!("init: {}", e)))?;

    let mut output = Vec::with_capacity((samples.len() as f64 * ratio) as usize + chunk_size);

    for chunk in samples.chunks(chunk_size) {
        let input = if chunk.len() < chunk_size {
            let mut padded = chunk.to_vec();
            padded.resize(chunk_size, 0.0);
            padded
        } else {
            chunk.to_vec()
        };

        let result = resampler
            .process(&[input], None)
            .map_err(|e| AudioDecodeError::Resample(e.to_string()))?;

        if let Some(channel) = result.first() {
            output.extend_from_slice(channel);
        }
    }

    // Drop the tail produced by zero padding.
    let expected_len = (samples.len() as f64 * ratio) as usize;
    output.truncate(expected_len);

    Ok(output)
}

/// Writes 16-bit PCM mono at [`TARGET_SAMPLE_RATE`].
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<(), AudioDecodeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: TARGET_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Reads a canonical waveform back into `[-1, 1]` samples.
pub fn read_wav(path: &Path) -> Result<Vec<f32>, AudioDecodeError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.channels != 1 || spec.sample_rate != TARGET_SAMPLE_RATE {
        return Err(AudioDecodeError::NotCanonical {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
        });
    }

    match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale).map_err(AudioDecodeError::from))
                .collect()
        }
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map_err(AudioDecodeError::from))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_samples_when_written_and_read_then_values_survive_16_bit_quantization() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 / 50.0).sin() * 0.5).collect();

        write_wav(&path, &samples).unwrap();
        let read = read_wav(&path).unwrap();

        assert_eq!(read.len(), samples.len());
        for (a, b) in samples.iter().zip(&read) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn given_stereo_wav_when_reading_canonical_then_it_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(0_i16).unwrap();
        writer.write_sample(0_i16).unwrap();
        writer.finalize().unwrap();

        assert!(matches!(
            read_wav(&path),
            Err(AudioDecodeError::NotCanonical { channels: 2, .. })
        ));
    }

    #[test]
    fn given_44k_stereo_wav_when_decoding_then_output_is_mono_16k() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("input.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 44_100,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..44_100 {
            let v = ((i as f32 / 20.0).sin() * 8000.0) as i16;
            writer.write_sample(v).unwrap();
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let pcm = decode_file_to_pcm(&path).unwrap();

        assert!((pcm.len() as i64 - 16_000).abs() < 64);
    }
}
