//! Proxy pool with lazy health checking.
//!
//! The manager owns all proxy health state: strategies obtain clients through
//! `get_client` and report bad proxies through `report_failure`; only the
//! rate-limited sweep can restore a demoted endpoint.

use rand::Rng;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::NetworkConfig;
use crate::Result;

const PROBE_URL: &str = "https://httpbin.org/ip";

/// One registered outbound path
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    /// Normalized proxy URL, e.g. "http://proxy.example.com:8080"
    pub address: String,
    /// Demoted on a failed use; restored only by a health sweep
    pub healthy: bool,
    /// When the last health probe ran, if any
    pub last_checked: Option<Instant>,
}

/// A client handle bound to either a proxy or the direct connection
#[derive(Debug, Clone)]
pub struct NetClient {
    pub client: reqwest::Client,
    proxy: Option<String>,
}

impl NetClient {
    pub fn direct(client: reqwest::Client) -> Self {
        Self {
            client,
            proxy: None,
        }
    }

    pub fn is_proxied(&self) -> bool {
        self.proxy.is_some()
    }
}

/// Summary of the pool for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPoolStatus {
    pub total: usize,
    pub healthy: usize,
}

struct PoolState {
    endpoints: Vec<ProxyEndpoint>,
    last_sweep: Option<Instant>,
}

/// Manages proxy rotation for outbound requests
pub struct ProxyManager {
    state: Mutex<PoolState>,
    network: NetworkConfig,
    test_interval: Duration,
}

impl ProxyManager {
    pub fn new(network: NetworkConfig) -> Self {
        let manager = Self {
            state: Mutex::new(PoolState {
                endpoints: Vec::new(),
                last_sweep: None,
            }),
            test_interval: Duration::from_secs(network.proxy_test_interval_secs),
            network: network.clone(),
        };

        for address in &network.proxies {
            if let Err(e) = manager.register(address) {
                tracing::warn!(address, error = %e, "ignoring invalid proxy address");
            }
        }

        manager
    }

    /// Register a proxy given a full URL or a bare `host:port`.
    ///
    /// New endpoints start healthy and are demoted on first failed use; the
    /// sweep settles their real state.
    pub fn register(&self, address: &str) -> Result<()> {
        let normalized = normalize_address(address)?;
        let mut state = self.lock_state();

        if state.endpoints.iter().any(|e| e.address == normalized) {
            return Ok(());
        }

        tracing::info!(address = %normalized, "registered proxy");
        state.endpoints.push(ProxyEndpoint {
            address: normalized,
            healthy: true,
            last_checked: None,
        });
        Ok(())
    }

    /// Supply a client: bound to a uniformly-random healthy proxy when one
    /// exists and `prefer_proxy` is set, otherwise direct.
    pub fn get_client(&self, prefer_proxy: bool) -> NetClient {
        if prefer_proxy {
            if let Some(address) = self.pick_healthy() {
                match reqwest::Proxy::all(&address) {
                    Ok(proxy) => {
                        tracing::debug!(address = %address, "using proxy");
                        return NetClient {
                            client: crate::net::browser_client(&self.network, Some(proxy)),
                            proxy: Some(address),
                        };
                    }
                    Err(e) => {
                        tracing::warn!(address = %address, error = %e, "proxy rejected by client builder");
                        self.demote(&address);
                    }
                }
            } else {
                tracing::debug!("no healthy proxies available, using direct connection");
            }
        }

        NetClient::direct(crate::net::browser_client(&self.network, None))
    }

    /// Demote the proxy a client was bound to. No-op for direct clients.
    pub fn report_failure(&self, client: &NetClient) {
        if let Some(address) = &client.proxy {
            self.demote(address);
        }
    }

    /// Probe every registered proxy and rebuild the healthy set.
    ///
    /// Rate-limited to once per test interval; calls inside the window return
    /// immediately.
    pub async fn sweep(&self) {
        let addresses: Vec<String> = {
            let mut state = self.lock_state();
            let now = Instant::now();
            if state
                .last_sweep
                .is_some_and(|last| now.duration_since(last) < self.test_interval)
            {
                return;
            }
            state.last_sweep = Some(now);
            state.endpoints.iter().map(|e| e.address.clone()).collect()
        };

        if addresses.is_empty() {
            return;
        }

        tracing::info!(count = addresses.len(), "probing proxy pool");
        for address in addresses {
            let healthy = self.probe(&address).await;
            let mut state = self.lock_state();
            if let Some(endpoint) = state.endpoints.iter_mut().find(|e| e.address == address) {
                endpoint.healthy = healthy;
                endpoint.last_checked = Some(Instant::now());
            }
        }

        let status = self.status();
        tracing::info!(
            healthy = status.healthy,
            total = status.total,
            "proxy sweep finished"
        );
    }

    pub fn status(&self) -> ProxyPoolStatus {
        let state = self.lock_state();
        ProxyPoolStatus {
            total: state.endpoints.len(),
            healthy: state.endpoints.iter().filter(|e| e.healthy).count(),
        }
    }

    async fn probe(&self, address: &str) -> bool {
        let Ok(proxy) = reqwest::Proxy::all(address) else {
            return false;
        };
        let client = crate::net::browser_client(&self.network, Some(proxy));

        match client.get(PROBE_URL).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(address, "proxy probe succeeded");
                true
            }
            Ok(response) => {
                tracing::debug!(address, status = %response.status(), "proxy probe failed");
                false
            }
            Err(e) => {
                tracing::debug!(address, error = %e, "proxy probe failed");
                false
            }
        }
    }

    fn pick_healthy(&self) -> Option<String> {
        let state = self.lock_state();
        let healthy: Vec<&ProxyEndpoint> =
            state.endpoints.iter().filter(|e| e.healthy).collect();
        if healthy.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..healthy.len());
        Some(healthy[index].address.clone())
    }

    fn demote(&self, address: &str) {
        let mut state = self.lock_state();
        if let Some(endpoint) = state.endpoints.iter_mut().find(|e| e.address == address) {
            if endpoint.healthy {
                tracing::debug!(address, "marked proxy as failed");
                endpoint.healthy = false;
            }
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PoolState> {
        // Mutex poisoning only happens after a panic while holding the lock;
        // the pool state is still usable.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize_address(address: &str) -> Result<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        anyhow::bail!("empty proxy address");
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };

    let parsed = url::Url::parse(&with_scheme)
        .map_err(|e| anyhow::anyhow!("invalid proxy address '{address}': {e}"))?;
    if parsed.host_str().is_none() {
        anyhow::bail!("proxy address '{address}' has no host");
    }

    Ok(with_scheme)
}
