//! Legacy timed-text XML parser and writer.
//!
//! The format is a flat sequence of `<text start="S" dur="D">escaped text</text>`
//! elements; nothing else in the document carries caption content.

use regex::Regex;

use super::{normalize_text, strip_bom};
use crate::transcript::{Transcript, TranscriptSegment};
use crate::EngineError;

pub fn parse(
    data: &str,
    video_id: &str,
    language: &str,
) -> Result<Option<Transcript>, EngineError> {
    let body = strip_bom(data).trim();
    if body.is_empty() {
        return Ok(None);
    }

    let looks_like_xml =
        body.starts_with("<?xml") || body.contains("<transcript") || body.contains("<text");
    if !looks_like_xml {
        return Err(EngineError::MalformedPayload(
            "payload is not timed-text XML".to_string(),
        ));
    }

    let element = Regex::new(r#"(?s)<text\s+([^>]*)>(.*?)</text>"#)
        .map_err(|e| EngineError::MalformedPayload(e.to_string()))?;
    let start_attr = Regex::new(r#"start="([^"]*)""#)
        .map_err(|e| EngineError::MalformedPayload(e.to_string()))?;
    let dur_attr = Regex::new(r#"dur="([^"]*)""#)
        .map_err(|e| EngineError::MalformedPayload(e.to_string()))?;
    let inner_tags =
        Regex::new(r"<[^>]*>").map_err(|e| EngineError::MalformedPayload(e.to_string()))?;

    let mut segments = Vec::new();
    for captures in element.captures_iter(body) {
        let attrs = &captures[1];
        let start = start_attr
            .captures(attrs)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);
        let dur = dur_attr
            .captures(attrs)
            .and_then(|c| c[1].parse::<f64>().ok())
            .unwrap_or(0.0);

        let raw = inner_tags.replace_all(&captures[2], "");
        if let Some(text) = normalize_text(&unescape_entities(&raw)) {
            segments.push(TranscriptSegment::new(start.max(0.0), dur.max(0.0), text));
        }
    }

    Ok(Transcript::from_segments(video_id, language, segments))
}

/// Serialize a transcript as timed-text XML.
pub fn write(transcript: &Transcript) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<transcript>\n");
    for segment in transcript.segments() {
        out.push_str(&format!(
            "<text start=\"{:.3}\" dur=\"{:.3}\">{}</text>\n",
            segment.start_time,
            segment.duration,
            escape_entities(&segment.text)
        ));
    }
    out.push_str("</transcript>\n");
    out
}

/// Decode the named entities timedtext payloads actually use, plus decimal and
/// hexadecimal numeric references.
fn unescape_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        let Some(end) = rest.find(';').filter(|&end| end <= 12) else {
            out.push('&');
            rest = &rest[1..];
            continue;
        };

        let entity = &rest[1..end];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            _ => entity
                .strip_prefix('#')
                .and_then(|num| {
                    if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        num.parse::<u32>().ok()
                    }
                })
                .and_then(char::from_u32),
        };

        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn escape_entities(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
