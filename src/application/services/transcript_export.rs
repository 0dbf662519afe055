use std::fmt::Write as _;
use std::str::FromStr;

use crate::domain::{Transcript, TranscriptSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Srt,
    Vtt,
    Txt,
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::Vtt => "vtt",
            Self::Txt => "txt",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "srt" => Ok(Self::Srt),
            "vtt" => Ok(Self::Vtt),
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Unsupported export format: {}. Use srt, vtt, txt or json",
                other
            )),
        }
    }
}

pub fn render(transcript: &Transcript, format: ExportFormat) -> Result<String, serde_json::Error> {
    Ok(match format {
        ExportFormat::Srt => render_srt(&transcript.segments),
        ExportFormat::Vtt => render_vtt(&transcript.segments),
        ExportFormat::Txt => transcript.full_text.clone(),
        ExportFormat::Json => serde_json::to_string_pretty(transcript)?,
    })
}

fn render_srt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        let text = match &segment.speaker {
            Some(speaker) => format!("[{}] {}", speaker, segment.text),
            None => segment.text.clone(),
        };
        let _ = write!(
            out,
            "{}\n{} --> {}\n{}\n\n",
            i + 1,
            timestamp(segment.start, ','),
            timestamp(segment.end, ','),
            text
        );
    }
    out
}

fn render_vtt(segments: &[TranscriptSegment]) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in segments {
        let text = match &segment.speaker {
            Some(speaker) => format!("<v {}>{}", speaker, segment.text),
            None => segment.text.clone(),
        };
        let _ = write!(
            out,
            "{} --> {}\n{}\n\n",
            timestamp(segment.start, '.'),
            timestamp(segment.end, '.'),
            text
        );
    }
    out
}

/// `HH:MM:SS<sep>mmm`
fn timestamp(seconds: f64, separator: char) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis % 3_600_000) / 60_000;
    let secs = (total_millis % 60_000) / 1000;
    let millis = total_millis % 1000;
    format!(
        "{:02}:{:02}:{:02}{}{:03}",
        hours, minutes, secs, separator, millis
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript() -> Transcript {
        Transcript::new(
            vec![
                TranscriptSegment::new(0.0, 1.5, "hello"),
                TranscriptSegment::new(3661.25, 3662.0, "world").with_speaker("SPEAKER_01"),
            ],
            "en",
            "Scripted",
        )
    }

    #[test]
    fn given_seconds_when_formatting_timestamp_then_hours_minutes_and_millis_are_padded() {
        assert_eq!(timestamp(0.0, ','), "00:00:00,000");
        assert_eq!(timestamp(3661.25, '.'), "01:01:01.250");
        assert_eq!(timestamp(-2.0, ','), "00:00:00,000");
    }

    #[test]
    fn given_transcript_when_rendering_srt_then_cues_are_numbered_with_speaker_prefix() {
        let srt = render(&transcript(), ExportFormat::Srt).unwrap();

        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,500\nhello\n\n\
             2\n01:01:01,250 --> 01:01:02,000\n[SPEAKER_01] world\n\n"
        );
    }

    #[test]
    fn given_transcript_when_rendering_vtt_then_header_and_voice_tags_are_present() {
        let vtt = render(&transcript(), ExportFormat::Vtt).unwrap();

        assert!(vtt.starts_with("WEBVTT\n\n"));
        assert!(vtt.contains("00:00:00.000 --> 00:00:01.500\nhello\n"));
        assert!(vtt.contains("<v SPEAKER_01>world"));
    }

    #[test]
    fn given_transcript_when_rendering_txt_then_full_text_is_returned() {
        assert_eq!(
            render(&transcript(), ExportFormat::Txt).unwrap(),
            "hello world"
        );
    }

    #[test]
    fn given_transcript_when_rendering_json_then_it_parses_back() {
        let json = render(&transcript(), ExportFormat::Json).unwrap();
        let parsed: Transcript = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, transcript());
    }

    #[test]
    fn given_format_names_when_parsing_then_case_is_ignored_and_unknown_is_rejected() {
        assert_eq!("SRT".parse::<ExportFormat>().unwrap(), ExportFormat::Srt);
        assert_eq!("vtt".parse::<ExportFormat>().unwrap(), ExportFormat::Vtt);
        assert!("docx".parse::<ExportFormat>().is_err());
    }
}
