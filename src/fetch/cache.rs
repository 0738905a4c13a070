//! Durable TTL cache
//!
//! Stores upstream payloads with the time they were fetched. Freshness is derived
//! from the entry age at read time and never stored. Every storage failure is
//! logged and absorbed here: a failed read is a miss, a failed write is dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::fingerprint::Fingerprint;
use super::store::KeyValueStore;

/// Freshness thresholds for cached payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    pub fresh: Duration,
    pub stale: Duration,
}

impl CacheTtl {
    /// `stale` is raised to `fresh` if shorter.
    pub fn new(fresh: Duration, stale: Duration) -> Self {
        Self { fresh, stale: stale.max(fresh) }
    }
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60), Duration::from_secs(24 * 60 * 60))
    }
}

/// Lifecycle state of a cache entry, by age.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served without contacting upstream
    Fresh,
    /// Only served when every upstream attempt failed
    Stale,
    /// Never served
    Expired,
}

impl Freshness {
    pub fn from_age(age: Duration, ttl: &CacheTtl) -> Self {
        if age < ttl.fresh {
            Freshness::Fresh
        } else if age < ttl.stale {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }
}

/// A cached payload and the instant it was stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(payload: Value) -> Self {
        Self { payload, stored_at: Utc::now() }
    }

    /// Age at `now`; entries from the future count as brand new.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.stored_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn freshness_at(&self, now: DateTime<Utc>, ttl: &CacheTtl) -> Freshness {
        Freshness::from_age(self.age_at(now), ttl)
    }
}

/// Fingerprint-keyed cache over a [`KeyValueStore`].
#[derive(Clone)]
pub struct DurableCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl: CacheTtl,
}

impl std::fmt::Debug for DurableCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DurableCache")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl DurableCache {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>, ttl: CacheTtl) -> Self {
        Self { store, prefix: prefix.into(), ttl }
    }

    pub fn ttl(&self) -> &CacheTtl {
        &self.ttl
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn storage_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}{}", self.prefix, fingerprint)
    }

    /// Look up an entry. Storage and decoding failures read as a miss.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let key = self.storage_key(fingerprint);
        let raw = match self.store.get_item(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(%fingerprint, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(%fingerprint, error = %e, "Corrupt cache entry, treating as miss");
                None
            }
        }
    }

    /// Store a payload stamped with the current time. Failures are logged only.
    pub async fn put(&self, fingerprint: &Fingerprint, payload: &Value) {
        self.put_entry(fingerprint, &CacheEntry { payload: payload.clone(), stored_at: Utc::now() })
            .await;
    }

    /// Store a prepared entry. Failures are logged only.
    pub async fn put_entry(&self, fingerprint: &Fingerprint, entry: &CacheEntry) {
        let serialized = match serde_json::to_string(entry) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!(%fingerprint, error = %e, "Cache entry serialization failed");
                return;
            }
        };

        match self.store.set_item(&self.storage_key(fingerprint), &serialized).await {
            Ok(()) => debug!(%fingerprint, bytes = serialized.len(), "Cached response"),
            Err(e) => warn!(%fingerprint, error = %e, "Cache write failed"),
        }
    }

    /// Remove entries whose fingerprint starts with `filter` (all entries when
    /// `None`). Returns the number of keys removed.
    pub async fn clear(&self, filter: Option<&str>) -> usize {
        let scope = format!("{}{}", self.prefix, filter.unwrap_or(""));

        let keys = match self.store.get_all_keys().await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(scope = %scope, error = %e, "Cache key listing failed");
                return 0;
            }
        };

        let doomed: Vec<String> = keys.into_iter().filter(|key| key.starts_with(&scope)).collect();
        if doomed.is_empty() {
            return 0;
        }

        match self.store.multi_remove(&doomed).await {
            Ok(()) => {
                debug!(scope = %scope, removed = doomed.len(), "Cleared cache entries");
                doomed.len()
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "Cache clear failed");
                0
            }
        }
    }
}
