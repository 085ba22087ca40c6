use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Acquisition behavior
    pub acquisition: AcquisitionConfig,

    /// Outbound network settings
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Deadline for a whole acquire call, in seconds
    pub overall_timeout_secs: u64,

    /// How long a failed video is skipped before being retried, in seconds.
    /// Zero disables the failure cache.
    pub failure_cache_ttl_secs: u64,

    /// Language codes tried against language-keyed endpoints, in order
    pub languages: Vec<String>,

    /// Strategy names for sequential mode, best-first. The default encodes
    /// the observed reliability ranking among transports; treat it as
    /// tunable, not as ground truth.
    pub sequential_order: Vec<String>,

    /// Path or name of the yt-dlp binary
    pub ytdlp_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// TCP connect timeout per request, in seconds
    pub connect_timeout_secs: u64,

    /// Full request timeout, in seconds
    pub request_timeout_secs: u64,

    /// Route caption downloads through the proxy pool when healthy proxies
    /// are available
    pub prefer_proxy: bool,

    /// Proxy addresses, either full URLs or bare host:port
    pub proxies: Vec<String>,

    /// Minimum interval between proxy health sweeps, in seconds
    pub proxy_test_interval_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            acquisition: AcquisitionConfig {
                overall_timeout_secs: 30,
                failure_cache_ttl_secs: 24 * 60 * 60,
                languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
                sequential_order: vec![
                    "data-api".to_string(),
                    "watch-page".to_string(),
                    "yt-dlp".to_string(),
                    "yt-dlp-auto".to_string(),
                    "timedtext".to_string(),
                    "innertube".to_string(),
                ],
                ytdlp_path: "yt-dlp".to_string(),
            },
            network: NetworkConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            request_timeout_secs: 15,
            prefer_proxy: false,
            proxies: Vec::new(),
            proxy_test_interval_secs: 300,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let content = fs_err::read_to_string(&config_path)
                .context("Failed to read config file")?;

            let config: EngineConfig = serde_yaml::from_str(&content)
                .context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self)
            .context("Failed to serialize config")?;

        fs_err::write(&config_path, content)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    fn config_path() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?;

        Ok(config_dir.join("transcript-harvest").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.acquisition.overall_timeout_secs == 0 {
            anyhow::bail!("overall timeout must be positive");
        }
        if self.acquisition.languages.is_empty() {
            anyhow::bail!("at least one language code must be configured");
        }
        if self.network.request_timeout_secs == 0 {
            anyhow::bail!("request timeout must be positive");
        }
        Ok(())
    }

    pub fn overall_timeout(&self) -> Duration {
        Duration::from_secs(self.acquisition.overall_timeout_secs)
    }

    pub fn failure_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.acquisition.failure_cache_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.overall_timeout(), Duration::from_secs(30));
        assert_eq!(config.failure_cache_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.acquisition.languages[0], "en");
        assert_eq!(config.acquisition.sequential_order[0], "data-api");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.acquisition.overall_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.acquisition.languages.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = EngineConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(
            parsed.acquisition.sequential_order,
            config.acquisition.sequential_order
        );
        assert_eq!(parsed.network.proxy_test_interval_secs, 300);
    }
}
