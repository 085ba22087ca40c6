//! Acquisition orchestrator: races the registered strategies under a deadline,
//! cancels losers, and remembers exhausted failures.

use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::net::ProxyManager;
use crate::strategies::{self, AcquisitionStrategy, CredentialStore, NoCredentials};
use crate::transcript::{AcquisitionResult, Transcript};

pub mod failure_cache;

pub use failure_cache::FailureCache;

/// Orchestrates transcript acquisition across the registered strategies
///
/// `acquire` races every strategy concurrently and returns the first success;
/// `acquire_sequential` walks the configured priority order instead, for
/// callers that need to respect per-host rate limits.
pub struct TranscriptEngine {
    config: EngineConfig,
    proxies: Arc<ProxyManager>,
    strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    failure_cache: FailureCache,
}

impl TranscriptEngine {
    /// Engine with the default strategy set and no API credential.
    pub fn new(config: EngineConfig) -> Self {
        Self::with_credentials(config, Arc::new(NoCredentials))
    }

    /// Engine with the default strategy set and an externally-managed
    /// credential for the authenticated-API strategy.
    pub fn with_credentials(config: EngineConfig, credentials: Arc<dyn CredentialStore>) -> Self {
        let proxies = Arc::new(ProxyManager::new(config.network.clone()));
        let strategies = strategies::default_strategies(&config, &proxies, &credentials);
        Self::assemble(config, proxies, strategies)
    }

    /// Engine with a caller-supplied strategy set.
    pub fn with_strategies(
        config: EngineConfig,
        strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    ) -> Self {
        let proxies = Arc::new(ProxyManager::new(config.network.clone()));
        Self::assemble(config, proxies, strategies)
    }

    fn assemble(
        config: EngineConfig,
        proxies: Arc<ProxyManager>,
        strategies: Vec<Arc<dyn AcquisitionStrategy>>,
    ) -> Self {
        let failure_cache = FailureCache::new(config.failure_cache_ttl());
        Self {
            config,
            proxies,
            strategies,
            failure_cache,
        }
    }

    /// Add a strategy to the set; the open end of the strategy seam.
    pub fn register(&mut self, strategy: Arc<dyn AcquisitionStrategy>) {
        self.strategies.push(strategy);
    }

    /// The proxy pool shared by the strategies.
    pub fn proxy_manager(&self) -> Arc<ProxyManager> {
        Arc::clone(&self.proxies)
    }

    /// Acquire a transcript, racing all strategies under the given deadline.
    ///
    /// Returns `None` both when no captions exist and when every strategy
    /// failed; "no transcript available" is an expected outcome, not an error.
    pub async fn acquire(
        &self,
        video_id: &str,
        overall_timeout: Duration,
        force_retry: bool,
    ) -> Option<Transcript> {
        self.acquire_detailed(video_id, overall_timeout, force_retry)
            .await
            .transcript
    }

    /// Like [`acquire`](Self::acquire), but exposes the winning result or the
    /// most informative failure for diagnostics.
    pub async fn acquire_detailed(
        &self,
        video_id: &str,
        overall_timeout: Duration,
        force_retry: bool,
    ) -> AcquisitionResult {
        let started = Instant::now();

        if !crate::utils::is_valid_video_id(video_id) {
            tracing::warn!(video_id, "identifier does not look like a video ID");
        }

        if !force_retry {
            if let Some(recorded) = self.failure_cache.get(video_id) {
                tracing::debug!(video_id, %recorded, "skipping recently failed video");
                return AcquisitionResult::failure(
                    video_id.to_string(),
                    "cache",
                    "recently failed, skipping".to_string(),
                    started.elapsed(),
                );
            }
        }

        if self.strategies.is_empty() {
            return AcquisitionResult::failure(
                video_id.to_string(),
                "all",
                "no strategies registered".to_string(),
                started.elapsed(),
            );
        }

        tracing::info!(
            video_id,
            strategies = self.strategies.len(),
            "starting acquisition race"
        );

        let cancel = CancellationToken::new();
        let mut in_flight = FuturesUnordered::new();
        for strategy in &self.strategies {
            let name = strategy.name();
            let vid = video_id.to_string();
            let handle = tokio::spawn(run_attempt(
                Arc::clone(strategy),
                video_id.to_string(),
                overall_timeout,
                cancel.child_token(),
            ));
            in_flight.push(async move {
                match handle.await {
                    Ok(result) => result,
                    // A panicking strategy must not abort its siblings
                    Err(e) => AcquisitionResult::failure(
                        vid,
                        name,
                        format!("strategy panicked: {e}"),
                        Duration::ZERO,
                    ),
                }
            });
        }

        let deadline = tokio::time::sleep(overall_timeout);
        tokio::pin!(deadline);

        let mut losers: Vec<AcquisitionResult> = Vec::new();
        let mut winner: Option<AcquisitionResult> = None;

        while !in_flight.is_empty() {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::debug!(video_id, "overall deadline elapsed");
                    break;
                }
                Some(result) = in_flight.next() => {
                    if result.success {
                        winner = Some(result);
                        break;
                    }
                    tracing::debug!(
                        video_id,
                        strategy = result.strategy_name,
                        error = result.error.as_deref().unwrap_or(""),
                        "strategy finished without a transcript"
                    );
                    losers.push(result);
                }
            }
        }

        // First success wins; everyone still in flight gets the signal
        cancel.cancel();

        if let Some(winner) = winner {
            tracing::info!(
                video_id,
                strategy = winner.strategy_name,
                elapsed_ms = winner.elapsed.as_millis() as u64,
                "transcript acquired"
            );
            self.failure_cache.invalidate(video_id);
            return winner;
        }

        tracing::warn!(video_id, "all strategies failed or timed out");
        self.failure_cache.put(video_id);

        losers
            .into_iter()
            .max_by_key(AcquisitionResult::error_detail_len)
            .unwrap_or_else(|| {
                AcquisitionResult::failure(
                    video_id.to_string(),
                    "all",
                    "all strategies failed or timed out".to_string(),
                    started.elapsed(),
                )
            })
    }

    /// Try strategies one at a time in the configured priority order,
    /// short-circuiting on the first success.
    pub async fn acquire_sequential(
        &self,
        video_id: &str,
        overall_timeout: Duration,
        force_retry: bool,
    ) -> Option<Transcript> {
        let started = Instant::now();

        if !force_retry && self.failure_cache.get(video_id).is_some() {
            tracing::debug!(video_id, "skipping recently failed video");
            return None;
        }

        let cancel = CancellationToken::new();
        for name in &self.config.acquisition.sequential_order {
            let Some(strategy) = self
                .strategies
                .iter()
                .find(|s| s.name() == name.as_str())
            else {
                tracing::warn!(strategy = %name, "sequential order names an unknown strategy");
                continue;
            };

            let remaining = overall_timeout.saturating_sub(started.elapsed());
            if remaining.is_zero() {
                tracing::debug!(video_id, "sequential budget exhausted");
                break;
            }

            let result = run_attempt(
                Arc::clone(strategy),
                video_id.to_string(),
                remaining,
                cancel.child_token(),
            )
            .await;

            if result.success {
                self.failure_cache.invalidate(video_id);
                return result.transcript;
            }
            tracing::debug!(
                video_id,
                strategy = result.strategy_name,
                error = result.error.as_deref().unwrap_or(""),
                "strategy finished without a transcript"
            );
        }

        self.failure_cache.put(video_id);
        None
    }

    /// Acquire transcripts for many videos with bounded concurrency.
    pub async fn acquire_many(
        &self,
        video_ids: &[String],
        max_concurrent: usize,
    ) -> Vec<AcquisitionResult> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
        let overall_timeout = self.config.overall_timeout();

        let attempts = video_ids.iter().map(|video_id| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore.acquire().await.ok();
                self.acquire_detailed(video_id, overall_timeout, false).await
            }
        });

        futures_util::future::join_all(attempts).await
    }
}

/// Run one strategy attempt under its sub-timeout.
///
/// The strategy itself honors the cancellation token at its I/O boundaries.
async fn run_attempt(
    strategy: Arc<dyn AcquisitionStrategy>,
    video_id: String,
    budget: Duration,
    cancel: CancellationToken,
) -> AcquisitionResult {
    let started = Instant::now();
    let outcome = match tokio::time::timeout(budget, strategy.attempt(&video_id, &cancel)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(crate::EngineError::Timeout(budget)),
    };
    AcquisitionResult::from_outcome(video_id, strategy.name(), outcome, started.elapsed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{AttemptOutcome, MockAcquisitionStrategy};
    use crate::transcript::TranscriptSegment;
    use crate::EngineError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const VIDEO_ID: &str = "abc123def45";

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("transcript_harvest=debug")
            .try_init();
    }

    fn sample_transcript() -> Transcript {
        Transcript::from_segments(
            VIDEO_ID,
            "en",
            vec![TranscriptSegment::new(0.0, 1.0, "hello")],
        )
        .unwrap()
    }

    #[derive(Clone, Copy)]
    enum FakeOutcome {
        Success,
        Absent,
        Fail(&'static str),
    }

    struct FakeStrategy {
        name: &'static str,
        delay: Duration,
        outcome: FakeOutcome,
        calls: Arc<AtomicUsize>,
        observed_cancel: Arc<AtomicBool>,
    }

    impl FakeStrategy {
        fn new(name: &'static str, delay: Duration, outcome: FakeOutcome) -> Self {
            Self {
                name,
                delay,
                outcome,
                calls: Arc::new(AtomicUsize::new(0)),
                observed_cancel: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    #[async_trait]
    impl AcquisitionStrategy for FakeStrategy {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _video_id: &str, cancel: &CancellationToken) -> AttemptOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.observed_cancel.store(true, Ordering::SeqCst);
                    Err(EngineError::Cancelled)
                }
                _ = tokio::time::sleep(self.delay) => match self.outcome {
                    FakeOutcome::Success => Ok(Some(sample_transcript())),
                    FakeOutcome::Absent => Ok(None),
                    FakeOutcome::Fail(message) => Err(EngineError::Transport(message.to_string())),
                },
            }
        }
    }

    fn engine_with(fakes: Vec<Arc<FakeStrategy>>) -> TranscriptEngine {
        let strategies = fakes
            .into_iter()
            .map(|f| f as Arc<dyn AcquisitionStrategy>)
            .collect();
        TranscriptEngine::with_strategies(EngineConfig::default(), strategies)
    }

    #[tokio::test]
    async fn test_race_returns_first_success_and_cancels_losers() {
        init_tracing();

        let slow_success = Arc::new(FakeStrategy::new(
            "fake-slow",
            Duration::from_secs(30),
            FakeOutcome::Success,
        ));
        let quick_failure = Arc::new(FakeStrategy::new(
            "fake-error",
            Duration::from_millis(10),
            FakeOutcome::Fail("boom"),
        ));
        let fast_success = Arc::new(FakeStrategy::new(
            "fake-fast",
            Duration::from_millis(60),
            FakeOutcome::Success,
        ));

        // Registration order deliberately puts the slow winner first
        let engine = engine_with(vec![
            Arc::clone(&slow_success),
            Arc::clone(&quick_failure),
            Arc::clone(&fast_success),
        ]);

        let result = engine
            .acquire_detailed(VIDEO_ID, Duration::from_secs(5), false)
            .await;

        assert!(result.success);
        assert_eq!(result.strategy_name, "fake-fast");
        assert_eq!(result.transcript.unwrap().full_text(), "hello");

        // The still-running strategy receives the cancellation signal
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(slow_success.observed_cancel.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_all_failures_cached_and_short_circuited() {
        let failing = Arc::new(FakeStrategy::new(
            "fake-error",
            Duration::from_millis(5),
            FakeOutcome::Fail("no luck"),
        ));
        let absent = Arc::new(FakeStrategy::new(
            "fake-absent",
            Duration::from_millis(5),
            FakeOutcome::Absent,
        ));
        let engine = engine_with(vec![Arc::clone(&failing), Arc::clone(&absent)]);

        assert!(engine
            .acquire(VIDEO_ID, Duration::from_secs(2), false)
            .await
            .is_none());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);

        // Second call is served from the failure cache without invoking
        // any strategy
        let cached = engine
            .acquire_detailed(VIDEO_ID, Duration::from_secs(2), false)
            .await;
        assert!(!cached.success);
        assert_eq!(cached.strategy_name, "cache");
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(absent.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_retry_bypasses_failure_cache() {
        let failing = Arc::new(FakeStrategy::new(
            "fake-error",
            Duration::from_millis(5),
            FakeOutcome::Fail("still no luck"),
        ));
        let engine = engine_with(vec![Arc::clone(&failing)]);

        assert!(engine
            .acquire(VIDEO_ID, Duration::from_secs(2), false)
            .await
            .is_none());
        assert!(engine
            .acquire(VIDEO_ID, Duration::from_secs(2), true)
            .await
            .is_none());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_overall_timeout_bounds_the_race() {
        let stuck = Arc::new(FakeStrategy::new(
            "fake-stuck",
            Duration::from_secs(60),
            FakeOutcome::Success,
        ));
        let engine = engine_with(vec![stuck]);

        let started = Instant::now();
        let result = engine
            .acquire(VIDEO_ID, Duration::from_millis(100), false)
            .await;
        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_most_informative_failure_wins_aggregation() {
        let terse = Arc::new(FakeStrategy::new(
            "fake-terse",
            Duration::from_millis(5),
            FakeOutcome::Fail("nope"),
        ));
        let verbose = Arc::new(FakeStrategy::new(
            "fake-verbose",
            Duration::from_millis(10),
            FakeOutcome::Fail("upstream rejected the caption listing with HTTP 429"),
        ));
        let engine = engine_with(vec![terse, verbose]);

        let result = engine
            .acquire_detailed(VIDEO_ID, Duration::from_secs(2), false)
            .await;
        assert!(!result.success);
        assert_eq!(result.strategy_name, "fake-verbose");
        assert!(result.error.unwrap().contains("HTTP 429"));
    }

    #[test]
    fn test_empty_strategy_set_is_clean_absence() {
        let engine = TranscriptEngine::with_strategies(EngineConfig::default(), Vec::new());
        let result = tokio_test::block_on(engine.acquire(VIDEO_ID, Duration::from_secs(1), false));
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_sequential_stops_at_first_success() {
        let mut first = MockAcquisitionStrategy::new();
        first.expect_name().return_const("m-one");
        first
            .expect_attempt()
            .times(1)
            .returning(|_, _| Ok(None));

        let mut second = MockAcquisitionStrategy::new();
        second.expect_name().return_const("m-two");
        let transcript = sample_transcript();
        second
            .expect_attempt()
            .times(1)
            .returning(move |_, _| Ok(Some(transcript.clone())));

        // Never attempted: the race is over before its turn
        let mut third = MockAcquisitionStrategy::new();
        third.expect_name().return_const("m-three");

        let mut config = EngineConfig::default();
        config.acquisition.sequential_order =
            vec!["m-one".into(), "m-two".into(), "m-three".into()];

        let engine = TranscriptEngine::with_strategies(
            config,
            vec![Arc::new(first), Arc::new(second), Arc::new(third)],
        );

        let transcript = engine
            .acquire_sequential(VIDEO_ID, Duration::from_secs(5), false)
            .await;
        assert_eq!(transcript.unwrap().full_text(), "hello");
    }

    #[tokio::test]
    async fn test_sequential_unknown_names_skipped() {
        let mut only = MockAcquisitionStrategy::new();
        only.expect_name().return_const("m-real");
        only.expect_attempt().times(1).returning(|_, _| Ok(None));

        let mut config = EngineConfig::default();
        config.acquisition.sequential_order = vec!["m-ghost".into(), "m-real".into()];

        let engine = TranscriptEngine::with_strategies(config, vec![Arc::new(only)]);
        assert!(engine
            .acquire_sequential(VIDEO_ID, Duration::from_secs(5), false)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_acquire_many_bounded() {
        let absent = Arc::new(FakeStrategy::new(
            "fake-absent",
            Duration::from_millis(5),
            FakeOutcome::Absent,
        ));
        let engine = engine_with(vec![absent]);

        let ids = vec!["aaaaaaaaaa1".to_string(), "bbbbbbbbbb2".to_string()];
        let results = engine.acquire_many(&ids, 2).await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| !r.success));
        assert_eq!(results[0].video_id, "aaaaaaaaaa1");
        assert_eq!(results[1].video_id, "bbbbbbbbbb2");
    }
}
