//! json3 event-stream parser and writer.
//!
//! The payload is `{"events": [{"tStartMs": N, "dDurationMs": N,
//! "segs": [{"utf8": "..."}, ...]}, ...]}`; an event's text is the
//! concatenation of its segment `utf8` fields, times are milliseconds.

use serde::{Deserialize, Serialize};

use super::{normalize_text, strip_bom};
use crate::transcript::{Transcript, TranscriptSegment};
use crate::EngineError;

#[derive(Debug, Serialize, Deserialize)]
struct EventStream {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Event {
    #[serde(rename = "tStartMs", default)]
    t_start_ms: f64,

    #[serde(rename = "dDurationMs", default, skip_serializing_if = "Option::is_none")]
    d_duration_ms: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    segs: Option<Vec<Seg>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Seg {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    utf8: Option<String>,
}

pub fn parse(
    data: &str,
    video_id: &str,
    language: &str,
) -> Result<Option<Transcript>, EngineError> {
    let body = strip_bom(data).trim();
    if body.is_empty() {
        return Ok(None);
    }

    let stream: EventStream = serde_json::from_str(body)
        .map_err(|e| EngineError::MalformedPayload(format!("invalid caption JSON: {e}")))?;

    let mut segments = Vec::new();
    for event in stream.events {
        // Events without segments carry timing metadata only
        let Some(segs) = event.segs else { continue };

        let joined: String = segs.into_iter().filter_map(|s| s.utf8).collect();
        if let Some(text) = normalize_text(&joined) {
            segments.push(TranscriptSegment::new(
                (event.t_start_ms / 1000.0).max(0.0),
                (event.d_duration_ms.unwrap_or(0.0) / 1000.0).max(0.0),
                text,
            ));
        }
    }

    Ok(Transcript::from_segments(video_id, language, segments))
}

/// Serialize a transcript as a json3 event stream.
pub fn write(transcript: &Transcript) -> String {
    let events = transcript
        .segments()
        .iter()
        .map(|segment| Event {
            t_start_ms: segment.start_time * 1000.0,
            d_duration_ms: Some(segment.duration * 1000.0),
            segs: Some(vec![Seg {
                utf8: Some(segment.text.clone()),
            }]),
        })
        .collect();

    // Serializing a plain struct of owned data cannot fail
    serde_json::to_string(&EventStream { events }).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event_stream() {
        let json = r#"{"events":[{"tStartMs":500,"dDurationMs":1200,"segs":[{"utf8":"Hi "},{"utf8":"there"}]}]}"#;
        let transcript = parse(json, "abc123def45", "en").unwrap().unwrap();

        assert_eq!(transcript.segments().len(), 1);
        let segment = &transcript.segments()[0];
        assert_eq!(segment.start_time, 0.5);
        assert_eq!(segment.duration, 1.2);
        assert_eq!(segment.text, "Hi there");
    }

    #[test]
    fn test_events_without_segs_skipped() {
        let json = r#"{"events":[{"tStartMs":0,"dDurationMs":100},{"tStartMs":100,"dDurationMs":200,"segs":[{"utf8":"kept"}]}]}"#;
        let transcript = parse(json, "abc123def45", "en").unwrap().unwrap();
        assert_eq!(transcript.segments().len(), 1);
        assert_eq!(transcript.full_text(), "kept");
    }

    #[test]
    fn test_newline_segs_dropped() {
        let json = r#"{"events":[{"tStartMs":0,"segs":[{"utf8":"\n"}]}]}"#;
        assert!(parse(json, "abc123def45", "en").unwrap().is_none());
    }

    #[test]
    fn test_missing_events_is_absent() {
        assert!(parse("{}", "abc123def45", "en").unwrap().is_none());
        assert!(parse("", "abc123def45", "en").unwrap().is_none());
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(parse("{\"events\": [", "abc123def45", "en").is_err());
    }

    #[test]
    fn test_round_trip_preserves_full_text() {
        let original = Transcript::from_segments(
            "abc123def45",
            "a.en",
            vec![
                TranscriptSegment::new(0.5, 1.2, "Hi there"),
                TranscriptSegment::new(1.7, 0.8, "again"),
            ],
        )
        .unwrap();

        let reparsed = parse(&write(&original), "abc123def45", "a.en")
            .unwrap()
            .unwrap();
        assert_eq!(reparsed.full_text(), original.full_text());
        assert_eq!(reparsed.segments().len(), original.segments().len());
    }
}
