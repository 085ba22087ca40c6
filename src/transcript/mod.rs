use serde::Serialize;
use std::time::Duration;

use crate::EngineError;

/// One spoken span of a caption transcript
///
/// Immutable once constructed; parsers are the only producers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start_time: f64,

    /// Duration in seconds (0.0 when the source format does not carry one)
    pub duration: f64,

    /// Whitespace-normalized, non-empty text
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_time: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start_time,
            duration,
            text: text.into(),
        }
    }
}

/// Canonical transcript for one video: ordered segments plus derived full text
///
/// A `Transcript` always holds at least one segment. The empty-result condition
/// is represented by absence (`None`), never by an empty object, so the only
/// constructor returns `Option`. `full_text` is derived from the segments at
/// construction and cannot drift from them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    video_id: String,
    language: String,
    segments: Vec<TranscriptSegment>,
    full_text: String,
}

impl Transcript {
    /// Build a transcript from parsed segments; `None` when `segments` is empty.
    pub fn from_segments(
        video_id: impl Into<String>,
        language: impl Into<String>,
        segments: Vec<TranscriptSegment>,
    ) -> Option<Self> {
        if segments.is_empty() {
            return None;
        }

        let full_text = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        Some(Self {
            video_id: video_id.into(),
            language: language.into(),
            segments,
            full_text,
        })
    }

    /// Opaque 11-character video identifier
    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    /// Language tag, e.g. "en", "en-US", or "a.en" for auto-generated tracks
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Segments in chronological order
    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    /// All segment text, space-joined
    pub fn full_text(&self) -> &str {
        &self.full_text
    }
}

/// Outcome of one strategy invocation, consumed once by the orchestrator
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    pub video_id: String,
    pub transcript: Option<Transcript>,
    pub strategy_name: &'static str,
    pub success: bool,
    pub error: Option<String>,
    pub elapsed: Duration,
}

impl AcquisitionResult {
    pub(crate) fn from_outcome(
        video_id: String,
        strategy_name: &'static str,
        outcome: Result<Option<Transcript>, EngineError>,
        elapsed: Duration,
    ) -> Self {
        match outcome {
            Ok(Some(transcript)) => Self {
                video_id,
                transcript: Some(transcript),
                strategy_name,
                success: true,
                error: None,
                elapsed,
            },
            Ok(None) => Self {
                video_id,
                transcript: None,
                strategy_name,
                success: false,
                error: Some("no captions available".to_string()),
                elapsed,
            },
            Err(e) => Self {
                video_id,
                transcript: None,
                strategy_name,
                success: false,
                error: Some(e.to_string()),
                elapsed,
            },
        }
    }

    pub(crate) fn failure(
        video_id: String,
        strategy_name: &'static str,
        error: String,
        elapsed: Duration,
    ) -> Self {
        Self {
            video_id,
            transcript: None,
            strategy_name,
            success: false,
            error: Some(error),
            elapsed,
        }
    }

    /// Length of the error description, used to pick the most informative
    /// failure when every strategy loses.
    pub(crate) fn error_detail_len(&self) -> usize {
        self.error.as_deref().map(str::len).unwrap_or(0)
    }
}
