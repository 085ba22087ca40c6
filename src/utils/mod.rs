use url::Url;

/// Check that a string looks like an opaque 11-character video identifier.
pub fn is_valid_video_id(candidate: &str) -> bool {
    candidate.len() == 11
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Extract a video ID from a raw ID or any common YouTube URL form
/// (watch, short youtu.be, embed, shorts).
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if is_valid_video_id(input) {
        return Some(input.to_string());
    }

    let url_str = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else if input.contains("youtube.com") || input.contains("youtu.be") {
        format!("https://{input}")
    } else {
        return None;
    };

    let url = Url::parse(&url_str).ok()?;
    let host = url.host_str()?;
    if !host.contains("youtube.com") && !host.contains("youtu.be") {
        return None;
    }

    // Standard watch URL: ?v=VIDEO_ID
    if let Some(id) = url
        .query_pairs()
        .find(|(key, _)| key == "v")
        .map(|(_, value)| value.to_string())
    {
        if is_valid_video_id(&id) {
            return Some(id);
        }
    }

    // Short URL: youtu.be/VIDEO_ID
    if host == "youtu.be" {
        if let Some(id) = url.path_segments().and_then(|mut segments| segments.next()) {
            if is_valid_video_id(id) {
                return Some(id.to_string());
            }
        }
    }

    // youtube.com/embed/VIDEO_ID and youtube.com/shorts/VIDEO_ID
    if let Some(segments) = url.path_segments() {
        let segments: Vec<&str> = segments.collect();
        if segments.len() >= 2 && matches!(segments[0], "embed" | "shorts" | "v") {
            let id = segments[1];
            if is_valid_video_id(id) {
                return Some(id.to_string());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_id_accepted() {
        assert_eq!(
            extract_video_id("dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_short_url_with_query() {
        assert_eq!(
            extract_video_id("https://youtu.be/_NuH3D4SN-c?si=VSFea_rMwtaiR8Q7").as_deref(),
            Some("_NuH3D4SN-c")
        );
    }

    #[test]
    fn test_embed_and_shorts_urls() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/embed/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
        assert_eq!(
            extract_video_id("youtube.com/shorts/dQw4w9WgXcQ").as_deref(),
            Some("dQw4w9WgXcQ")
        );
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(extract_video_id("not-a-valid-id").is_none());
        assert!(extract_video_id("https://example.com/watch?v=dQw4w9WgXcQ").is_none());
        assert!(extract_video_id("").is_none());
    }

    #[test]
    fn test_is_valid_video_id() {
        assert!(is_valid_video_id("dQw4w9WgXcQ"));
        assert!(is_valid_video_id("_NuH3D4SN-c"));
        assert!(!is_valid_video_id("short"));
        assert!(!is_valid_video_id("has spaces !"));
    }
}
