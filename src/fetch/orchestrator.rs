//! Resilient fetch orchestrator
//!
//! One `fetch` primitive combining, in order:
//!
//! 1. single-flight deduplication per fingerprint
//! 2. fresh-cache short circuit
//! 3. queued upstream attempts with exponential backoff
//! 4. stale-cache fallback once every attempt has failed
//!
//! ```text
//! fetch(path, params)
//!     │
//!     ├─ fingerprint in flight? ──yes──► await shared result
//!     │ no
//!     ├─ cache entry Fresh? ──────yes──► return cached payload
//!     │ no
//!     ├─ attempt 0..=max_retries (queue permit held per attempt)
//!     │     ok  ──► cache.put ──► return payload
//!     │     err ──► sleep(retry_delay * 2^attempt)
//!     │
//!     ├─ entry Stale && use_stale_on_error ──► return stale payload
//!     └─ return last error
//! ```
//!
//! Each resolution runs on its own tokio task. Callers only await its shared
//! result, so dropping a caller never strands a queue permit. The in-flight
//! registration is removed by a drop guard owned by that task, so it is released
//! on success, error, and panic alike.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::cache::{DurableCache, Freshness};
use super::fingerprint::{Fingerprint, QueryParams};
use super::queue::RequestQueue;
use super::upstream::Upstream;
use crate::{PaddockError, Result};

/// Per-call retry and degradation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Base backoff; attempt `n` waits `retry_delay * 2^n`
    pub retry_delay: Duration,
    /// Serve a stale cached payload when every attempt failed
    pub use_stale_on_error: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { max_retries: 2, retry_delay: Duration::from_millis(1000), use_stale_on_error: true }
    }
}

impl FetchOptions {
    /// Delay after the failed attempt numbered `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<Value>>>>;
type InFlightRegistry = DashMap<Fingerprint, SharedFetch>;

/// Cached, queued, retrying, deduplicating access to an [`Upstream`].
///
/// Cheap to clone; clones share the queue, cache, and in-flight registry.
#[derive(Clone)]
pub struct Fetcher {
    inner: Arc<FetcherInner>,
}

struct FetcherInner {
    upstream: Arc<dyn Upstream>,
    cache: DurableCache,
    queue: RequestQueue,
    in_flight: Arc<InFlightRegistry>,
    defaults: FetchOptions,
}

impl std::fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetcher")
            .field("cache", &self.inner.cache)
            .field("queue", &self.inner.queue)
            .field("in_flight", &self.inner.in_flight.len())
            .field("defaults", &self.inner.defaults)
            .finish()
    }
}

impl Fetcher {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        cache: DurableCache,
        queue: RequestQueue,
        defaults: FetchOptions,
    ) -> Self {
        Self {
            inner: Arc::new(FetcherInner {
                upstream,
                cache,
                queue,
                in_flight: Arc::new(DashMap::new()),
                defaults,
            }),
        }
    }

    pub fn cache(&self) -> &DurableCache {
        &self.inner.cache
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.inner.queue
    }

    pub fn defaults(&self) -> FetchOptions {
        self.inner.defaults
    }

    /// Number of fingerprints currently being resolved.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.len()
    }

    /// Fetch and decode a resource.
    ///
    /// Decoding happens per caller; a payload that does not fit `T` fails this
    /// call with [`PaddockError::Decode`] without touching the cache.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &QueryParams,
        options: Option<FetchOptions>,
    ) -> Result<T> {
        let payload = self.fetch_value(path, params, options).await?;
        T::deserialize(payload.as_ref())
            .map_err(|e| PaddockError::decode(format!("{} response", path), e.to_string()))
    }

    /// Fetch the raw JSON payload for a resource.
    ///
    /// Callers that join an in-flight request share its options and its result.
    pub async fn fetch_value(
        &self,
        path: &str,
        params: &QueryParams,
        options: Option<FetchOptions>,
    ) -> Result<Arc<Value>> {
        let fingerprint = Fingerprint::new(path, params);

        let flight = match self.inner.in_flight.entry(fingerprint.clone()) {
            Entry::Occupied(existing) => {
                debug!(%fingerprint, "Joining in-flight request");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                let guard = InFlightGuard {
                    registry: Arc::clone(&self.inner.in_flight),
                    fingerprint: fingerprint.clone(),
                };
                let this = self.clone();
                let path = path.to_string();
                let params = params.clone();
                let options = options.unwrap_or(self.inner.defaults);

                // Issued requests run to completion even if every caller goes away
                let task = tokio::spawn(async move {
                    let _guard = guard;
                    this.resolve(&fingerprint, &path, &params, options).await
                });
                let flight = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(PaddockError::task(format!("fetch task failed: {}", e)))
                    })
                }
                .boxed()
                .shared();

                slot.insert(flight.clone());
                flight
            }
        };

        flight.await
    }

    async fn resolve(
        &self,
        fingerprint: &Fingerprint,
        path: &str,
        params: &QueryParams,
        options: FetchOptions,
    ) -> Result<Arc<Value>> {
        let cache = &self.inner.cache;
        let cached = cache.get(fingerprint).await;
        let freshness = cached.as_ref().map(|entry| entry.freshness_at(Utc::now(), cache.ttl()));

        if let (Some(entry), Some(Freshness::Fresh)) = (&cached, freshness) {
            debug!(%fingerprint, "Cache hit");
            return Ok(Arc::new(entry.payload.clone()));
        }
        debug!(%fingerprint, state = ?freshness, "Cache miss");

        let last_error = match self.attempt_upstream(fingerprint, path, params, options).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };

        match (cached, freshness) {
            (Some(entry), Some(Freshness::Stale)) if options.use_stale_on_error => {
                warn!(
                    %fingerprint,
                    error = %last_error,
                    stored_at = %entry.stored_at,
                    "Upstream failed, serving stale cache entry"
                );
                Ok(Arc::new(entry.payload))
            }
            _ => Err(last_error),
        }
    }

    async fn attempt_upstream(
        &self,
        fingerprint: &Fingerprint,
        path: &str,
        params: &QueryParams,
        options: FetchOptions,
    ) -> Result<Arc<Value>> {
        let mut attempt = 0u32;
        loop {
            let result = {
                let _permit = self.inner.queue.acquire().await?;
                self.inner.upstream.get(path, params).await
            };

            let error = match result {
                Ok(payload) => {
                    self.inner.cache.put(fingerprint, &payload).await;
                    return Ok(Arc::new(payload));
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= options.max_retries {
                warn!(%fingerprint, attempt, error = %error, "Upstream request failed");
                return Err(error);
            }

            let delay = options.backoff(attempt);
            warn!(
                %fingerprint,
                attempt,
                retry_in_ms = delay.as_millis() as u64,
                error = %error,
                "Upstream request failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Remove every durable cache entry.
    pub async fn clear_cache(&self) -> usize {
        self.inner.cache.clear(None).await
    }

    /// Remove durable cache entries for one endpoint path.
    pub async fn clear_cache_for_endpoint(&self, path: &str) -> usize {
        self.inner.cache.clear(Some(path)).await
    }
}

/// Unregisters a fingerprint when its shared future completes or is dropped.
struct InFlightGuard {
    registry: Arc<InFlightRegistry>,
    fingerprint: Fingerprint,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.fingerprint);
    }
}
