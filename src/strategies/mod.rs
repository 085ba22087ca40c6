use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::net::ProxyManager;
use crate::transcript::Transcript;
use crate::EngineError;

pub mod data_api;
pub mod innertube;
pub mod timedtext;
pub mod watch_page;
pub mod ytdlp;

pub use data_api::{CredentialStore, DataApiStrategy, NoCredentials, StaticCredentialStore};
pub use innertube::InnertubeStrategy;
pub use timedtext::TimedTextStrategy;
pub use watch_page::WatchPageStrategy;
pub use ytdlp::YtdlpStrategy;

/// What one attempt produced: a transcript, a clean "no captions", or a failure
pub type AttemptOutcome = Result<Option<Transcript>, EngineError>;

/// One self-contained transport path for acquiring a transcript
///
/// Implementations must be safe to cancel mid-flight: every blocking I/O await
/// is raced against the token, and no partial global state survives a
/// cancelled attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AcquisitionStrategy: Send + Sync {
    /// Stable identifier used in logs, results, and ordering configuration
    fn name(&self) -> &'static str;

    /// Try to acquire a transcript for the given video
    async fn attempt(&self, video_id: &str, cancel: &CancellationToken) -> AttemptOutcome;
}

/// Build the default strategy set in registration order.
pub fn default_strategies(
    config: &EngineConfig,
    proxies: &Arc<ProxyManager>,
    credentials: &Arc<dyn CredentialStore>,
) -> Vec<Arc<dyn AcquisitionStrategy>> {
    vec![
        Arc::new(DataApiStrategy::new(
            Arc::clone(credentials),
            &config.network,
        )),
        Arc::new(WatchPageStrategy::new(
            Arc::clone(proxies),
            config.network.prefer_proxy,
        )),
        Arc::new(YtdlpStrategy::new(config)),
        Arc::new(YtdlpStrategy::auto_captions_only(config)),
        Arc::new(TimedTextStrategy::new(config)),
        Arc::new(InnertubeStrategy::new(&config.network)),
    ]
}

/// GET a URL, racing the request against cancellation.
pub(crate) async fn fetch_text(
    client: &reqwest::Client,
    url: &str,
    cancel: &CancellationToken,
) -> Result<(reqwest::StatusCode, String), EngineError> {
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        result = client.get(url).send() => {
            result.map_err(|e| EngineError::Transport(format!("request to {url} failed: {e}")))?
        }
    };

    let status = response.status();
    let body = tokio::select! {
        _ = cancel.cancelled() => return Err(EngineError::Cancelled),
        result = response.text() => {
            result.map_err(|e| EngineError::Transport(format!("reading body from {url} failed: {e}")))?
        }
    };

    Ok((status, body))
}

/// Sleep, racing the delay against cancellation.
pub(crate) async fn cancellable_sleep(
    delay: std::time::Duration,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(EngineError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

/// Prefix auto-generated track languages the way the canonical model expects
/// ("a.en" for auto-generated English).
pub(crate) fn track_language(language_code: &str, auto_generated: bool) -> String {
    if auto_generated {
        format!("a.{language_code}")
    } else {
        language_code.to_string()
    }
}
