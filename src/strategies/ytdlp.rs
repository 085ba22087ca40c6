//! Third-party tool strategy: delegate subtitle URL extraction to yt-dlp,
//! which tracks YouTube's anti-bot measures so we don't have to.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{fetch_text, track_language, AcquisitionStrategy, AttemptOutcome};
use crate::config::EngineConfig;
use crate::{wire, EngineError};

/// yt-dlp wrapper; the tool only lists subtitle URLs, the engine downloads
/// and parses them itself.
pub struct YtdlpStrategy {
    tool_path: String,
    languages: Vec<String>,
    auto_only: bool,
    client: reqwest::Client,
}

impl YtdlpStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tool_path: config.acquisition.ytdlp_path.clone(),
            languages: config.acquisition.languages.clone(),
            auto_only: false,
            client: crate::net::browser_client(&config.network, None),
        }
    }

    /// Variant that only consults auto-generated captions; sequential mode
    /// uses it as a separate fallback rung.
    pub fn auto_captions_only(config: &EngineConfig) -> Self {
        Self {
            auto_only: true,
            ..Self::new(config)
        }
    }

    /// Check if yt-dlp is available
    pub async fn check_availability(&self) -> bool {
        Command::new(&self.tool_path)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    async fn dump_video_info(
        &self,
        video_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, EngineError> {
        let url = format!(
            "https://www.youtube.com/watch?v={}",
            urlencoding::encode(video_id)
        );

        let mut command = Command::new(&self.tool_path);
        command
            .args(["--dump-json", "--no-playlist", "--skip-download", &url])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = command.output() => {
                result.map_err(|e| EngineError::Tool(format!("failed to run {}: {e}", self.tool_path)))?
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Tool(format!(
                "{} failed: {}",
                self.tool_path,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| EngineError::Tool(format!("{} produced invalid JSON: {e}", self.tool_path)))
    }

    fn select_subtitle<'a>(&self, info: &'a Value) -> Option<(String, bool, &'a Value)> {
        if !self.auto_only {
            if let Some(found) = pick_from_map(info.get("subtitles"), &self.languages) {
                return Some((found.0, false, found.1));
            }
        }
        pick_from_map(info.get("automatic_captions"), &self.languages)
            .map(|(language, entry)| (language, true, entry))
    }
}

#[async_trait]
impl AcquisitionStrategy for YtdlpStrategy {
    fn name(&self) -> &'static str {
        if self.auto_only {
            "yt-dlp-auto"
        } else {
            "yt-dlp"
        }
    }

    async fn attempt(&self, video_id: &str, cancel: &CancellationToken) -> AttemptOutcome {
        if !self.check_availability().await {
            return Err(EngineError::Tool(format!(
                "{} is not available on this system",
                self.tool_path
            )));
        }

        tracing::debug!(video_id, strategy = self.name(), "extracting subtitle listing");
        let info = self.dump_video_info(video_id, cancel).await?;

        let Some((language_code, auto_generated, entry)) = self.select_subtitle(&info) else {
            tracing::debug!(video_id, "no matching subtitles listed");
            return Ok(None);
        };

        let Some(subtitle_url) = entry.get("url").and_then(Value::as_str) else {
            tracing::debug!(video_id, "subtitle entry carries no URL");
            return Ok(None);
        };

        let (status, body) = fetch_text(&self.client, subtitle_url, cancel).await?;
        if !status.is_success() || body.trim().is_empty() {
            return Err(EngineError::Transport(format!(
                "subtitle download returned HTTP {status}"
            )));
        }

        let language = track_language(&language_code, auto_generated);
        wire::parse_auto(&body, video_id, &language)
    }
}

/// Find the first configured language in a subtitle map, preferring the
/// WebVTT rendition of the track.
fn pick_from_map<'a>(map: Option<&'a Value>, languages: &[String]) -> Option<(String, &'a Value)> {
    let map = map?.as_object()?;
    for language in languages {
        let Some(entries) = map.get(language).and_then(Value::as_array) else {
            continue;
        };

        let vtt = entries
            .iter()
            .find(|e| e.get("ext").and_then(Value::as_str) == Some("vtt"));
        if let Some(entry) = vtt.or_else(|| entries.iter().find(|e| e.get("url").is_some())) {
            return Some((language.clone(), entry));
        }
    }
    None
}
