//! Resilient access to OpenF1 motorsport telemetry, with session-level analytics.
//!
//! Paddock sits between a UI and the [OpenF1](https://openf1.org) REST API and
//! keeps the UI responsive when the network is not.
//!
//! # Features
//!
//! - **Bounded concurrency**: a fair request queue caps in-flight upstream calls
//! - **Durable cache**: responses survive restarts, with fresh and stale windows
//! - **Resilience**: single-flight deduplication, exponential backoff, stale-on-error
//! - **Session analytics**: safety-car periods, pace consistency, tyre degradation,
//!   pit-stop impact, overtakes, and qualifying sector analysis
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use paddock::{Paddock, PaddockConfig, SessionDetail};
//!
//! #[tokio::main]
//! async fn main() -> paddock::Result<()> {
//!     let paddock = Paddock::open(PaddockConfig::default().with_env_overrides()?).await?;
//!
//!     if let Some(SessionDetail::Race(race)) = paddock.sessions().session_detail(9158).await? {
//!         for record in &race.pace_consistency {
//!             println!("#{} ±{:.3}s", record.driver.driver_number, record.std_dev);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;

// Data access
pub mod api;
pub mod fetch;

// Derived data
pub mod aggregate;
pub mod race_control;
pub mod stats;

pub use error::*;

pub use config::PaddockConfig;

pub use api::{OpenF1Client, SessionKind};
pub use fetch::{FetchOptions, Fetcher, KeyValueStore, QueryParams, Upstream};

pub use aggregate::{
    DriverSessionDetail, PracticeSessionDetail, QualifyingSessionDetail, RaceSessionDetail,
    SessionAggregator, SessionDetail,
};
pub use race_control::{SafetyCarInterval, SafetyCarSummary, summarize_safety_car};
pub use stats::DriverRef;

use std::sync::Arc;
use tracing::info;

use fetch::{DurableCache, FileStore, HttpUpstream, MemoryStore, RequestQueue};

/// Unified entry point wiring configuration, storage, transport, and aggregates.
///
/// # Examples
///
/// ## Persistent cache
/// ```rust,no_run
/// use paddock::{Paddock, PaddockConfig};
///
/// # #[tokio::main]
/// # async fn main() -> paddock::Result<()> {
/// let config = PaddockConfig { cache_dir: Some("/tmp/openf1".into()), ..Default::default() };
/// let paddock = Paddock::open(config).await?;
/// let meetings = paddock.api().meetings(2024).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Paddock {
    config: PaddockConfig,
    api: OpenF1Client,
    sessions: SessionAggregator,
}

impl Paddock {
    /// Build a client talking to the configured OpenF1 endpoint.
    ///
    /// Uses a [`FileStore`] under `cache_dir` when set, otherwise an in-memory
    /// store that lasts as long as the process.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration fails validation
    /// - The cache directory cannot be created
    /// - The HTTP client cannot be constructed
    pub async fn open(config: PaddockConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn KeyValueStore> = match &config.cache_dir {
            Some(dir) => Arc::new(FileStore::open(dir).await?),
            None => Arc::new(MemoryStore::new()),
        };
        let upstream =
            HttpUpstream::new(&config.base_url, config.request_timeout(), &config.user_agent)?;
        Self::with_upstream(config, Arc::new(upstream), store)
    }

    /// Build a client over an arbitrary transport and store.
    pub fn with_upstream(
        config: PaddockConfig,
        upstream: Arc<dyn Upstream>,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self> {
        config.validate()?;
        let cache = DurableCache::new(store, config.cache_prefix.clone(), config.cache_ttl());
        let queue = RequestQueue::new(config.max_concurrent_requests);
        let fetcher = Fetcher::new(upstream, cache, queue, config.fetch_options());
        let api = OpenF1Client::new(fetcher);
        let sessions = SessionAggregator::new(api.clone(), config.aggregate_ttl());

        info!(
            base_url = %config.base_url,
            max_concurrent_requests = config.max_concurrent_requests,
            persistent_cache = config.cache_dir.is_some(),
            "Paddock client ready"
        );
        Ok(Self { config, api, sessions })
    }

    pub fn config(&self) -> &PaddockConfig {
        &self.config
    }

    /// Raw, typed OpenF1 accessors.
    pub fn api(&self) -> &OpenF1Client {
        &self.api
    }

    /// Cached session and driver detail views.
    pub fn sessions(&self) -> &SessionAggregator {
        &self.sessions
    }

    /// Remove every durable cache entry. Aggregates are left alone.
    pub async fn clear_cache(&self) -> usize {
        self.api.fetcher().clear_cache().await
    }

    /// Remove durable cache entries for one endpoint path, e.g. `"/laps"`.
    pub async fn clear_cache_for_endpoint(&self, path: &str) -> usize {
        self.api.fetcher().clear_cache_for_endpoint(path).await
    }

    /// Empty the in-memory aggregate caches. The durable cache is left alone.
    pub fn clear_aggregates(&self) {
        self.sessions.clear();
    }
}
