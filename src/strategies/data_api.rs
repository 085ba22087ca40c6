//! Authenticated Data API strategy.
//!
//! Requires a pre-established credential supplied through the
//! [`CredentialStore`] seam; the consent/authorization flow itself is managed
//! outside this crate. Without a credential the strategy bows out of the race
//! instead of failing it.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::{track_language, AcquisitionStrategy, AttemptOutcome};
use crate::config::NetworkConfig;
use crate::{wire, EngineError};

const CAPTIONS_URL: &str = "https://www.googleapis.com/youtube/v3/captions";

/// Source of an externally-managed API credential
pub trait CredentialStore: Send + Sync {
    /// A currently-valid bearer token, or `None` when unauthenticated
    fn bearer_token(&self) -> Option<String>;
}

/// Credential store for processes that never authenticate
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Credential store wrapping a token obtained out-of-band
pub struct StaticCredentialStore {
    token: String,
}

impl StaticCredentialStore {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialStore for StaticCredentialStore {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Authenticated-API fetch via the official captions resource
pub struct DataApiStrategy {
    credentials: Arc<dyn CredentialStore>,
    client: reqwest::Client,
}

impl DataApiStrategy {
    pub fn new(credentials: Arc<dyn CredentialStore>, network: &NetworkConfig) -> Self {
        Self {
            credentials,
            client: crate::net::browser_client(network, None),
        }
    }

    async fn list_tracks(
        &self,
        video_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Value>, EngineError> {
        let url = format!(
            "{CAPTIONS_URL}?part=id%2Csnippet&videoId={}",
            urlencoding::encode(video_id)
        );

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.client.get(&url).bearer_auth(token).send() => {
                result.map_err(|e| EngineError::Transport(format!("caption list request failed: {e}")))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Transport(format!(
                "caption list returned HTTP {status}"
            )));
        }

        let listing: Value = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = response.json() => {
                result.map_err(|e| EngineError::MalformedPayload(format!("caption list response: {e}")))?
            }
        };

        Ok(listing
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    async fn download_track(
        &self,
        track_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, EngineError> {
        let url = format!("{CAPTIONS_URL}/{}?tfmt=vtt", urlencoding::encode(track_id));

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = self.client.get(&url).bearer_auth(token).send() => {
                result.map_err(|e| EngineError::Transport(format!("caption download failed: {e}")))?
            }
        };

        let status = response.status();
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = response.text() => {
                result.map_err(|e| EngineError::Transport(format!("reading caption body failed: {e}")))?
            }
        };

        // Some tracks are individually download restricted; the caller moves
        // on to the next-best track
        if status == reqwest::StatusCode::FORBIDDEN || body.contains("downloadRestricted") {
            tracing::debug!(track_id, "caption track is download restricted");
            return Ok(None);
        }
        if !status.is_success() {
            tracing::debug!(track_id, %status, "caption track download rejected");
            return Ok(None);
        }

        Ok(Some(body))
    }
}

#[async_trait]
impl AcquisitionStrategy for DataApiStrategy {
    fn name(&self) -> &'static str {
        "data-api"
    }

    async fn attempt(&self, video_id: &str, cancel: &CancellationToken) -> AttemptOutcome {
        let Some(token) = self.credentials.bearer_token() else {
            return Err(EngineError::AuthUnavailable);
        };

        let items = self.list_tracks(video_id, &token, cancel).await?;
        if items.is_empty() {
            tracing::debug!(video_id, "no caption tracks listed");
            return Ok(None);
        }

        let candidates = rank_tracks(&items);
        let mut any_restricted = false;

        for track in candidates {
            let Some(track_id) = track.get("id").and_then(Value::as_str) else {
                continue;
            };
            let snippet = track.get("snippet").cloned().unwrap_or(Value::Null);
            let language_code = snippet
                .get("language")
                .and_then(Value::as_str)
                .unwrap_or("en");
            let auto_generated = is_auto_generated(&snippet);

            let Some(body) = self.download_track(track_id, &token, cancel).await? else {
                any_restricted = true;
                continue;
            };

            let language = track_language(language_code, auto_generated);
            match wire::vtt::parse(&body, video_id, &language) {
                Ok(Some(transcript)) => {
                    tracing::debug!(
                        video_id,
                        language = %language,
                        segments = transcript.segments().len(),
                        "caption track downloaded via data API"
                    );
                    return Ok(Some(transcript));
                }
                Ok(None) => continue,
                Err(e) => {
                    tracing::debug!(track_id, error = %e, "caption payload unparsable");
                    continue;
                }
            }
        }

        if any_restricted {
            return Err(EngineError::Transport(
                "all caption tracks were download restricted".to_string(),
            ));
        }
        Ok(None)
    }
}

fn is_auto_generated(snippet: &Value) -> bool {
    snippet
        .get("trackKind")
        .and_then(Value::as_str)
        .map(|kind| kind.eq_ignore_ascii_case("asr"))
        .unwrap_or(false)
}

fn is_english(snippet: &Value) -> bool {
    snippet
        .get("language")
        .and_then(Value::as_str)
        .map(|language| language.starts_with("en"))
        .unwrap_or(false)
}

/// Order tracks best-first: manual English, auto English, manual other,
/// auto other.
fn rank_tracks(items: &[Value]) -> Vec<&Value> {
    let mut manual_english = Vec::new();
    let mut auto_english = Vec::new();
    let mut manual_other = Vec::new();
    let mut auto_other = Vec::new();

    for item in items {
        let snippet = item.get("snippet").cloned().unwrap_or(Value::Null);
        match (is_english(&snippet), is_auto_generated(&snippet)) {
            (true, false) => manual_english.push(item),
            (true, true) => auto_english.push(item),
            (false, false) => manual_other.push(item),
            (false, true) => auto_other.push(item),
        }
    }

    manual_english
        .into_iter()
        .chain(auto_english)
        .chain(manual_other)
        .chain(auto_other)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rank_tracks_priority() {
        let items = vec![
            json!({"id": "auto-de", "snippet": {"language": "de", "trackKind": "ASR"}}),
            json!({"id": "manual-de", "snippet": {"language": "de", "trackKind": "standard"}}),
            json!({"id": "auto-en", "snippet": {"language": "en", "trackKind": "ASR"}}),
            json!({"id": "manual-en", "snippet": {"language": "en-US", "trackKind": "standard"}}),
        ];

        let ranked: Vec<&str> = rank_tracks(&items)
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ranked, vec!["manual-en", "auto-en", "manual-de", "auto-de"]);
    }

    #[test]
    fn test_auto_generated_detection() {
        assert!(is_auto_generated(&json!({"trackKind": "ASR"})));
        assert!(is_auto_generated(&json!({"trackKind": "asr"})));
        assert!(!is_auto_generated(&json!({"trackKind": "standard"})));
        assert!(!is_auto_generated(&json!({})));
    }

    #[tokio::test]
    async fn test_missing_credential_is_auth_unavailable() {
        let strategy = DataApiStrategy::new(Arc::new(NoCredentials), &NetworkConfig::default());
        let cancel = CancellationToken::new();

        let outcome = strategy.attempt("abc123def45", &cancel).await;
        assert!(matches!(outcome, Err(EngineError::AuthUnavailable)));
    }

    #[test]
    fn test_static_store_supplies_token() {
        let store = StaticCredentialStore::new("ya29.token");
        assert_eq!(store.bearer_token().as_deref(), Some("ya29.token"));
        assert!(NoCredentials.bearer_token().is_none());
    }
}
