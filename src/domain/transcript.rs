use serde::{Deserialize, Serialize};

/// One timestamped span of transcript text. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

impl TranscriptSegment {
    /// Builds a segment with `end >= start >= 0`, trimmed text and full confidence.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        let start = round_millis(start.max(0.0));
        let end = round_millis(end).max(start);
        Self {
            start,
            end,
            text: text.into().trim().to_string(),
            confidence: 1.0,
            speaker: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            round_millis(confidence.clamp(0.0, 1.0))
        } else {
            0.0
        };
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        let speaker = speaker.into();
        self.speaker = if speaker.trim().is_empty() {
            None
        } else {
            Some(speaker)
        };
        self
    }
}

/// The structured output of one successful transcription run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    pub segments: Vec<TranscriptSegment>,
    pub language: String,
    pub full_text: String,
    pub engine: String,
}

impl Transcript {
    pub fn new(
        segments: Vec<TranscriptSegment>,
        language: impl Into<String>,
        engine: impl Into<String>,
    ) -> Self {
        let full_text = join_segments(&segments);
        Self {
            segments,
            language: language.into(),
            full_text,
            engine: engine.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Replaces the text of one segment in place and regenerates `full_text`.
    /// Returns `false` without touching anything when `index` is out of range.
    pub fn edit_segment_text(&mut self, index: usize, text: &str) -> bool {
        match self.segments.get_mut(index) {
            Some(segment) => {
                segment.text = text.trim().to_string();
                self.full_text = join_segments(&self.segments);
                true
            }
            None => false,
        }
    }
}

fn join_segments(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

fn round_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
