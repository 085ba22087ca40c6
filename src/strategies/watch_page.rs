//! Browser-mimicking watch-page strategy: load the page, dig the player
//! response JSON out of the markup, and download the first caption track that
//! parses.

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::{cancellable_sleep, fetch_text, track_language, AcquisitionStrategy, AttemptOutcome};
use crate::net::ProxyManager;
use crate::{wire, EngineError};

const MAX_DOWNLOAD_ATTEMPTS: u32 = 3;

/// The player response is embedded in the page under one of several known
/// shapes; they are tried in order until one parses.
const PLAYER_RESPONSE_PATTERNS: &[&str] = &[
    r"(?s)var ytInitialPlayerResponse = (\{.+?\});",
    r#"(?s)window\["ytInitialPlayerResponse"\] = (\{.+?\});"#,
    r#"(?s)"ytInitialPlayerResponse":\s*(\{.+?\})(?:,|\})"#,
    r"(?s)ytInitialPlayerResponse\s*=\s*(\{.+?\});",
];

struct CaptionTrack {
    language_code: String,
    base_url: String,
    auto_generated: bool,
}

/// Direct fetch that mimics a browser loading the watch page
pub struct WatchPageStrategy {
    proxies: Arc<ProxyManager>,
    prefer_proxy: bool,
}

impl WatchPageStrategy {
    pub fn new(proxies: Arc<ProxyManager>, prefer_proxy: bool) -> Self {
        Self {
            proxies,
            prefer_proxy,
        }
    }

    /// Download one caption track with exponential backoff, rotating onto a
    /// proxy for retries when the pool has healthy entries.
    async fn download_track(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, EngineError> {
        for attempt in 0..MAX_DOWNLOAD_ATTEMPTS {
            if attempt > 0 {
                let jitter: f64 = { rand::thread_rng().gen_range(0.5..1.5) };
                let delay = Duration::from_secs_f64(f64::from(2u32.pow(attempt)) + jitter);
                tracing::debug!(attempt, ?delay, "retrying caption download");
                cancellable_sleep(delay, cancel).await?;
                if self.prefer_proxy {
                    // Rate-limited internally; a no-op inside the test interval
                    self.proxies.sweep().await;
                }
            }

            // First try goes direct; retries rotate onto the proxy pool
            let net = self.proxies.get_client(self.prefer_proxy && attempt > 0);

            match fetch_text(&net.client, url, cancel).await {
                Ok((status, body)) if status.is_success() && !body.trim().is_empty() => {
                    return Ok(Some(body));
                }
                Ok((status, body)) => {
                    tracing::debug!(
                        %status,
                        content_length = body.len(),
                        "caption download rejected"
                    );
                    self.proxies.report_failure(&net);
                }
                Err(EngineError::Cancelled) => return Err(EngineError::Cancelled),
                Err(e) => {
                    tracing::debug!(error = %e, "caption download failed");
                    self.proxies.report_failure(&net);
                }
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl AcquisitionStrategy for WatchPageStrategy {
    fn name(&self) -> &'static str {
        "watch-page"
    }

    async fn attempt(&self, video_id: &str, cancel: &CancellationToken) -> AttemptOutcome {
        let watch_url = format!(
            "https://www.youtube.com/watch?v={}",
            urlencoding::encode(video_id)
        );
        tracing::debug!(video_id, "loading watch page");

        let net = self.proxies.get_client(false);
        let (status, page) = fetch_text(&net.client, &watch_url, cancel).await?;
        if !status.is_success() {
            return Err(EngineError::Transport(format!(
                "watch page returned HTTP {status}"
            )));
        }

        if page_reports_unavailable(&page) {
            tracing::debug!(video_id, "video is unavailable");
            return Ok(None);
        }

        let player_response = extract_player_response(&page).ok_or_else(|| {
            EngineError::MalformedPayload(
                "could not extract player response from watch page".to_string(),
            )
        })?;

        let tracks = extract_caption_tracks(&player_response);
        if tracks.is_empty() {
            tracing::debug!(video_id, "no caption tracks listed");
            return Ok(None);
        }
        tracing::debug!(video_id, count = tracks.len(), "found caption tracks");

        for track in tracks {
            let Some(body) = self.download_track(&track.base_url, cancel).await? else {
                continue;
            };

            let language = track_language(&track.language_code, track.auto_generated);
            match wire::parse_auto(&body, video_id, &language) {
                Ok(Some(transcript)) => {
                    tracing::debug!(
                        video_id,
                        language = %language,
                        segments = transcript.segments().len(),
                        "caption track parsed"
                    );
                    return Ok(Some(transcript));
                }
                Ok(None) => {
                    tracing::debug!(language = %language, "caption track was empty");
                }
                Err(e) => {
                    tracing::debug!(language = %language, error = %e, "caption track failed to parse");
                }
            }
        }

        Ok(None)
    }
}

fn page_reports_unavailable(page: &str) -> bool {
    page.contains("Video unavailable") || page.contains("This video is not available")
}

fn extract_player_response(page: &str) -> Option<Value> {
    for pattern in PLAYER_RESPONSE_PATTERNS {
        let Ok(re) = Regex::new(pattern) else {
            continue;
        };
        if let Some(captures) = re.captures(page) {
            if let Ok(value) = serde_json::from_str::<Value>(&captures[1]) {
                return Some(value);
            }
        }
    }
    None
}

fn extract_caption_tracks(player_response: &Value) -> Vec<CaptionTrack> {
    player_response
        .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")
        .and_then(Value::as_array)
        .map(|tracks| {
            tracks
                .iter()
                .filter_map(|track| {
                    Some(CaptionTrack {
                        language_code: track.get("languageCode")?.as_str()?.to_string(),
                        base_url: track.get("baseUrl")?.as_str()?.to_string(),
                        auto_generated: track
                            .get("kind")
                            .and_then(Value::as_str)
                            .map(|k| k == "asr")
                            .unwrap_or(false),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
