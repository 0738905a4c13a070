//! Client configuration
//!
//! Configuration is plain data with defaults for every field, so an empty YAML
//! document is a valid configuration. Environment overrides are applied on top.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetch::{CacheTtl, FetchOptions};
use crate::{PaddockError, Result};

/// Default OpenF1 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openf1.org/v1";

/// Default key prefix for durable cache entries.
pub const DEFAULT_CACHE_PREFIX: &str = "openf1_cache_";

/// Top-level configuration for [`crate::Paddock`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaddockConfig {
    /// Upstream API base URL, without trailing slash
    pub base_url: String,
    /// Per-request network timeout
    pub request_timeout_ms: u64,
    /// Maximum concurrent upstream requests
    pub max_concurrent_requests: usize,
    /// Prefix for durable cache keys
    pub cache_prefix: String,
    /// Directory for the durable cache; in-memory store when absent
    pub cache_dir: Option<PathBuf>,
    /// Age below which a cached response is served without a network call
    pub fresh_ttl_secs: u64,
    /// Age below which a cached response may back a failed refresh
    pub stale_ttl_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base backoff delay, doubled per attempt
    pub retry_delay_ms: u64,
    /// Serve stale cache entries when every attempt failed
    pub use_stale_on_error: bool,
    /// Lifetime of derived session aggregates
    pub aggregate_ttl_secs: u64,
    /// User agent sent upstream
    pub user_agent: String,
}

impl Default for PaddockConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_ms: 20_000,
            max_concurrent_requests: 3,
            cache_prefix: DEFAULT_CACHE_PREFIX.to_string(),
            cache_dir: None,
            fresh_ttl_secs: 5 * 60,
            stale_ttl_secs: 24 * 60 * 60,
            max_retries: 2,
            retry_delay_ms: 1_000,
            use_stale_on_error: true,
            aggregate_ttl_secs: 30,
            user_agent: concat!("paddock/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PaddockConfig {
    /// Parse configuration from a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a YAML configuration file.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            PaddockError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Apply `PADDOCK_*` environment variable overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup, keyed by environment variable name.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("PADDOCK_BASE_URL") {
            self.base_url = url;
        }
        if let Some(dir) = lookup("PADDOCK_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup("PADDOCK_MAX_CONCURRENT_REQUESTS") {
            self.max_concurrent_requests =
                parse_override("PADDOCK_MAX_CONCURRENT_REQUESTS", &value)?;
        }
        if let Some(value) = lookup("PADDOCK_REQUEST_TIMEOUT_MS") {
            self.request_timeout_ms = parse_override("PADDOCK_REQUEST_TIMEOUT_MS", &value)?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Reject configurations the runtime cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(PaddockError::config("base_url must not be empty"));
        }
        if self.max_concurrent_requests == 0 {
            return Err(PaddockError::config("max_concurrent_requests must be at least 1"));
        }
        if self.stale_ttl_secs < self.fresh_ttl_secs {
            return Err(PaddockError::config(format!(
                "stale_ttl_secs ({}) must not be shorter than fresh_ttl_secs ({})",
                self.stale_ttl_secs, self.fresh_ttl_secs
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn aggregate_ttl(&self) -> Duration {
        Duration::from_secs(self.aggregate_ttl_secs)
    }

    pub fn cache_ttl(&self) -> CacheTtl {
        CacheTtl::new(
            Duration::from_secs(self.fresh_ttl_secs),
            Duration::from_secs(self.stale_ttl_secs),
        )
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            max_retries: self.max_retries,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            use_stale_on_error: self.use_stale_on_error,
        }
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PaddockError::config(format!("{} has invalid value '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_upstream_contract() {
        let config = PaddockConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.request_timeout(), Duration::from_secs(20));
        assert_eq!(config.max_concurrent_requests, 3);

        let options = config.fetch_options();
        assert_eq!(options, FetchOptions::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "max_concurrent_requests: 5\ncache_dir: /tmp/paddock\nretry_delay_ms: 250\n";
        let config = PaddockConfig::from_yaml_str(yaml).expect("valid yaml");

        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/paddock")));
        assert_eq!(config.retry_delay_ms, 250);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.fresh_ttl_secs, 300);
    }

    #[test]
    fn empty_yaml_is_default() {
        assert_eq!(PaddockConfig::from_yaml_str("  \n").unwrap(), PaddockConfig::default());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PaddockConfig::from_yaml_str("max_concurrent_requests: 0"),
            Err(PaddockError::Config { .. })
        ));
        assert!(matches!(
            PaddockConfig::from_yaml_str("fresh_ttl_secs: 100\nstale_ttl_secs: 10"),
            Err(PaddockError::Config { .. })
        ));
        assert!(matches!(
            PaddockConfig::from_yaml_str("max_retries: [1, 2]"),
            Err(PaddockError::Config { .. })
        ));
    }

    #[test]
    fn overrides_apply_on_top_of_file_values() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("PADDOCK_BASE_URL", "http://localhost:8080/v1"),
            ("PADDOCK_MAX_CONCURRENT_REQUESTS", "8"),
        ]);

        let config = PaddockConfig::default()
            .with_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .expect("valid overrides");

        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.request_timeout_ms, 20_000);
    }

    #[test]
    fn malformed_override_is_a_config_error() {
        let result = PaddockConfig::default().with_overrides_from(|key| {
            (key == "PADDOCK_REQUEST_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(PaddockError::Config { .. })));
    }
}
