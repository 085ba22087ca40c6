//! Outbound HTTP plumbing: browser-profile clients and the proxy pool.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT};
use std::time::Duration;

use crate::config::NetworkConfig;

pub mod proxy;

pub use proxy::{NetClient, ProxyEndpoint, ProxyManager, ProxyPoolStatus};

/// User-Agent presented on every request; YouTube serves different markup to
/// clients it does not recognize as browsers.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// Header set mimicking a real browser session on youtube.com.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(ORIGIN, HeaderValue::from_static("https://www.youtube.com"));
    headers.insert(REFERER, HeaderValue::from_static("https://www.youtube.com/"));
    headers
}

/// Build a browser-profile client, optionally bound to a proxy address.
///
/// Falls back to a default client if the builder rejects the configuration;
/// proxy construction errors are the caller's concern (see `ProxyManager`).
pub fn browser_client(network: &NetworkConfig, proxy: Option<reqwest::Proxy>) -> reqwest::Client {
    let mut builder = reqwest::Client::builder()
        .default_headers(browser_headers())
        .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
        .timeout(Duration::from_secs(network.request_timeout_secs));

    if let Some(proxy) = proxy {
        builder = builder.proxy(proxy);
    }

    builder.build().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_headers_complete() {
        let headers = browser_headers();
        assert!(headers
            .get(USER_AGENT)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Chrome"));
        assert_eq!(headers.get(ACCEPT).unwrap(), "*/*");
        assert_eq!(
            headers.get(ORIGIN).unwrap(),
            "https://www.youtube.com"
        );
    }

    #[test]
    fn test_browser_client_builds() {
        let network = NetworkConfig::default();
        let _client = browser_client(&network, None);
    }
}
