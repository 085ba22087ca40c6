//! Caption wire formats: parsers and writers for WebVTT, legacy timed-text XML,
//! and the json3 event stream.
//!
//! All parsers share one contract: `Ok(Some(_))` for a transcript with at least
//! one non-empty segment, `Ok(None)` when the payload is structurally valid but
//! yields zero non-empty segments (content absence), and `Err` only for a
//! malformed payload.

use crate::transcript::Transcript;
use crate::EngineError;

pub mod json_events;
pub mod timedtext;
pub mod vtt;

/// Supported caption wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    Vtt,
    TimedTextXml,
    JsonEvents,
}

impl CaptionFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptionFormat::Vtt => "vtt",
            CaptionFormat::TimedTextXml => "timedtext-xml",
            CaptionFormat::JsonEvents => "json-events",
        }
    }
}

/// Strip a UTF-8 byte-order mark if present.
pub(crate) fn strip_bom(data: &str) -> &str {
    data.strip_prefix('\u{feff}').unwrap_or(data)
}

/// Guess the wire format from the payload's leading bytes.
///
/// Payloads starting with `<` are timed-text XML, a `WEBVTT` header means
/// WebVTT, and `{` / `[` mean a JSON event stream.
pub fn sniff(payload: &str) -> Option<CaptionFormat> {
    let body = strip_bom(payload).trim_start();
    if body.starts_with("WEBVTT") {
        Some(CaptionFormat::Vtt)
    } else if body.starts_with('<') {
        Some(CaptionFormat::TimedTextXml)
    } else if body.starts_with('{') || body.starts_with('[') {
        Some(CaptionFormat::JsonEvents)
    } else {
        None
    }
}

/// Sniff the format and parse with the matching parser.
pub fn parse_auto(
    payload: &str,
    video_id: &str,
    language: &str,
) -> Result<Option<Transcript>, EngineError> {
    match sniff(payload) {
        Some(CaptionFormat::Vtt) => vtt::parse(payload, video_id, language),
        Some(CaptionFormat::TimedTextXml) => timedtext::parse(payload, video_id, language),
        Some(CaptionFormat::JsonEvents) => json_events::parse(payload, video_id, language),
        None if strip_bom(payload).trim().is_empty() => Ok(None),
        None => Err(EngineError::MalformedPayload(
            "unrecognized caption payload".to_string(),
        )),
    }
}

/// Collapse whitespace runs and trim; returns `None` when nothing survives.
pub(crate) fn normalize_text(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_formats() {
        assert_eq!(sniff("WEBVTT\n\n"), Some(CaptionFormat::Vtt));
        assert_eq!(sniff("\u{feff}WEBVTT"), Some(CaptionFormat::Vtt));
        assert_eq!(sniff("<?xml version=\"1.0\"?>"), Some(CaptionFormat::TimedTextXml));
        assert_eq!(sniff("<transcript>"), Some(CaptionFormat::TimedTextXml));
        assert_eq!(sniff("{\"events\":[]}"), Some(CaptionFormat::JsonEvents));
        assert_eq!(sniff("[]"), Some(CaptionFormat::JsonEvents));
        assert_eq!(sniff("plain text"), None);
    }

    #[test]
    fn test_parse_auto_empty_is_absent() {
        assert!(parse_auto("", "abc123def45", "en").unwrap().is_none());
        assert!(parse_auto("   \n\t ", "abc123def45", "en").unwrap().is_none());
    }

    #[test]
    fn test_parse_auto_unrecognized_is_error() {
        assert!(parse_auto("certainly not captions", "abc123def45", "en").is_err());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  a \n b\t c  "), Some("a b c".to_string()));
        assert_eq!(normalize_text("   \n "), None);
    }
}
