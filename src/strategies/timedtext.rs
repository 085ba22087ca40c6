//! Timedtext endpoint strategy: hit the known caption-download endpoint with a
//! small set of language codes, preferring the json3 variant over legacy XML.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{fetch_text, AcquisitionStrategy, AttemptOutcome};
use crate::config::EngineConfig;
use crate::wire;

const ENDPOINT: &str = "https://www.youtube.com/api/timedtext";

/// Direct fetch against the public timedtext endpoint
pub struct TimedTextStrategy {
    client: reqwest::Client,
    languages: Vec<String>,
}

impl TimedTextStrategy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            client: crate::net::browser_client(&config.network, None),
            languages: config.acquisition.languages.clone(),
        }
    }
}

#[async_trait]
impl AcquisitionStrategy for TimedTextStrategy {
    fn name(&self) -> &'static str {
        "timedtext"
    }

    async fn attempt(&self, video_id: &str, cancel: &CancellationToken) -> AttemptOutcome {
        for language in &self.languages {
            for format in [Some("json3"), None] {
                let url = endpoint_url(video_id, language, format);
                tracing::debug!(video_id, language = %language, ?format, "querying timedtext endpoint");

                let (status, body) = match fetch_text(&self.client, &url, cancel).await {
                    Ok(response) => response,
                    Err(crate::EngineError::Cancelled) => {
                        return Err(crate::EngineError::Cancelled)
                    }
                    Err(e) => {
                        tracing::debug!(language = %language, error = %e, "timedtext request failed");
                        continue;
                    }
                };

                // Non-200 and empty bodies are attempt failures for this
                // language/format, not transport errors
                if !status.is_success() || body.trim().is_empty() {
                    tracing::debug!(language = %language, %status, "no captions from timedtext");
                    continue;
                }

                match wire::parse_auto(&body, video_id, language) {
                    Ok(Some(transcript)) => return Ok(Some(transcript)),
                    Ok(None) => continue,
                    Err(e) => {
                        tracing::debug!(language = %language, error = %e, "timedtext payload unparsable");
                        continue;
                    }
                }
            }
        }

        Ok(None)
    }
}

fn endpoint_url(video_id: &str, language: &str, format: Option<&str>) -> String {
    let mut url = format!(
        "{ENDPOINT}?v={}&lang={}",
        urlencoding::encode(video_id),
        urlencoding::encode(language)
    );
    if let Some(format) = format {
        url.push_str("&fmt=");
        url.push_str(format);
    }
    url
}
