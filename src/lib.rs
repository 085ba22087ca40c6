//! Transcript Harvest - resilient caption transcript acquisition for YouTube videos
//!
//! This library obtains time-aligned caption transcripts for a video despite an
//! adversarial upstream: several independent transport strategies (watch-page
//! scraping, the timedtext endpoint, the innertube API, yt-dlp, the authenticated
//! Data API) are raced under a deadline, recent failures are remembered, and the
//! heterogeneous wire formats (WebVTT, legacy timed-text XML, JSON event streams)
//! are normalized into one canonical transcript model.

pub mod config;
pub mod engine;
pub mod net;
pub mod strategies;
pub mod transcript;
pub mod utils;
pub mod wire;

pub use config::EngineConfig;
pub use engine::TranscriptEngine;
pub use net::ProxyManager;
pub use strategies::{AcquisitionStrategy, CredentialStore};
pub use transcript::{AcquisitionResult, Transcript, TranscriptSegment};
pub use utils::extract_video_id;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the acquisition engine
///
/// "No captions available" is never an error: strategies and parsers report
/// that condition as `Ok(None)` so the orchestrator can keep racing siblings.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed caption payload: {0}")]
    MalformedPayload(String),

    #[error("attempt timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("attempt cancelled")]
    Cancelled,

    #[error("no valid credential available")]
    AuthUnavailable,

    #[error("external tool failed: {0}")]
    Tool(String),
}

impl EngineError {
    /// Whether the error only means "this attempt lost" rather than
    /// "something upstream went wrong" (used to pick log levels).
    pub fn is_benign(&self) -> bool {
        matches!(self, EngineError::Cancelled | EngineError::AuthUnavailable)
    }
}
