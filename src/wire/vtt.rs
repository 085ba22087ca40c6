//! WebVTT parser and writer.

use regex::Regex;

use super::{normalize_text, strip_bom};
use crate::transcript::{Transcript, TranscriptSegment};
use crate::EngineError;

/// Parse a WebVTT payload into a canonical transcript.
///
/// Cue identifiers, `NOTE` blocks, and styling tags are dropped; cues whose
/// text normalizes to nothing are not emitted. A payload with neither a
/// `WEBVTT` header nor any timestamp line is treated as malformed.
pub fn parse(
    data: &str,
    video_id: &str,
    language: &str,
) -> Result<Option<Transcript>, EngineError> {
    let body = strip_bom(data);
    if body.trim().is_empty() {
        return Ok(None);
    }

    let lines: Vec<&str> = body.lines().collect();
    let saw_header = body.trim_start().starts_with("WEBVTT");
    let mut saw_cue_timing = false;
    let mut segments = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i].trim();

        if !line.contains("-->") {
            i += 1;
            continue;
        }
        saw_cue_timing = true;

        let (start, end) = match parse_timing_line(line) {
            Some(times) => times,
            None => {
                tracing::debug!(line, "skipping unparsable cue timing line");
                i += 1;
                continue;
            }
        };

        // Consume the cue's text: every following non-blank line up to the
        // next timing line.
        let mut text_lines = Vec::new();
        i += 1;
        while i < lines.len() {
            let text_line = lines[i].trim();
            if text_line.is_empty() || text_line.contains("-->") {
                break;
            }
            text_lines.push(text_line);
            i += 1;
        }

        if let Some(text) = normalize_text(&clean_cue_text(&text_lines.join(" "))) {
            segments.push(TranscriptSegment::new(
                start,
                (end - start).max(0.0),
                text,
            ));
        }
    }

    if segments.is_empty() {
        if saw_header || saw_cue_timing {
            return Ok(None);
        }
        return Err(EngineError::MalformedPayload(
            "payload has neither a WEBVTT header nor cue timings".to_string(),
        ));
    }

    Ok(Transcript::from_segments(video_id, language, segments))
}

/// Serialize a transcript as WebVTT.
pub fn write(transcript: &Transcript) -> String {
    let mut out = String::from("WEBVTT\n\n");
    for segment in transcript.segments() {
        let end = segment.start_time + segment.duration;
        out.push_str(&format!(
            "{} --> {}\n{}\n\n",
            format_timestamp(segment.start_time),
            format_timestamp(end),
            segment.text
        ));
    }
    out
}

/// `HH:MM:SS.mmm` for a time in seconds
pub(crate) fn format_timestamp(seconds: f64) -> String {
    let ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = ms / 3_600_000;
    let mins = (ms % 3_600_000) / 60_000;
    let secs = (ms % 60_000) / 1_000;
    let millis = ms % 1_000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, mins, secs, millis)
}

/// Split a `start --> end` line, ignoring cue settings after the end time.
fn parse_timing_line(line: &str) -> Option<(f64, f64)> {
    let (start_part, rest) = line.split_once("-->")?;
    let start = parse_timestamp(start_part.trim())?;
    let end = parse_timestamp(rest.trim().split_whitespace().next()?)?;
    Some((start, end))
}

/// `HH:MM:SS.mmm` or `MM:SS.mmm` (hours optional) to seconds
fn parse_timestamp(stamp: &str) -> Option<f64> {
    let parts: Vec<&str> = stamp.split(':').collect();
    let seconds = match parts.as_slice() {
        [h, m, s] => {
            h.parse::<f64>().ok()? * 3600.0 + m.parse::<f64>().ok()? * 60.0 + s.parse::<f64>().ok()?
        }
        [m, s] => m.parse::<f64>().ok()? * 60.0 + s.parse::<f64>().ok()?,
        [s] => s.parse::<f64>().ok()?,
        _ => return None,
    };
    if seconds.is_finite() && seconds >= 0.0 {
        Some(seconds)
    } else {
        None
    }
}

/// Strip inline styling tags like `<c.colorCCCCCC>`, `<i>`, `<00:00:01.000>`
/// and `{...}` alignment blocks.
fn clean_cue_text(text: &str) -> String {
    let Ok(tags) = Regex::new(r"<[^>]*>") else {
        return text.to_string();
    };
    let Ok(blocks) = Regex::new(r"\{[^}]*\}") else {
        return text.to_string();
    };
    let without_tags = tags.replace_all(text, "");
    blocks.replace_all(&without_tags, "").into_owned()
}
