//! Short-TTL in-memory cache with single-flight builds.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::{PaddockError, Result};

type SharedBuild<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

struct Cached<V> {
    built_at: Instant,
    value: Arc<V>,
}

/// Memoizes derived values per key for a fixed TTL.
///
/// Concurrent callers for a key that is being built await the same build. Failed
/// builds are shared with every waiter but never stored.
///
/// Builds run on their own task, so a caller that gives up does not stall the
/// build for anyone else. A build that started before [`clear`](Self::clear)
/// still answers its waiters but does not store its value.
pub struct AggregateCache<K, V> {
    name: &'static str,
    ttl: Duration,
    entries: Arc<DashMap<K, Cached<V>>>,
    in_flight: Arc<DashMap<K, SharedBuild<V>>>,
    generation: Arc<AtomicU64>,
}

impl<K: Eq + Hash, V> Debug for AggregateCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AggregateCache")
            .field("name", &self.name)
            .field("ttl", &self.ttl)
            .field("entries", &self.entries.len())
            .field("in_flight", &self.in_flight.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> AggregateCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self {
            name,
            ttl,
            entries: Arc::new(DashMap::new()),
            in_flight: Arc::new(DashMap::new()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key` if it is younger than the TTL. An expired value is evicted.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        {
            let cached = self.entries.get(key)?;
            if cached.built_at.elapsed() < self.ttl {
                return Some(Arc::clone(&cached.value));
            }
        }
        self.entries.remove_if(key, |_, cached| cached.built_at.elapsed() >= self.ttl);
        None
    }

    /// Return the cached value for `key`, or run `build` once for all concurrent callers.
    pub async fn get_or_build<F, Fut>(&self, key: K, build: F) -> Result<Arc<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        if let Some(value) = self.get(&key) {
            debug!(cache = self.name, ?key, "Aggregate cache hit");
            return Ok(value);
        }

        let flight = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(existing) => {
                debug!(cache = self.name, ?key, "Joining in-flight aggregate build");
                existing.get().clone()
            }
            Entry::Vacant(slot) => {
                // A build may have landed between the first lookup and taking the slot
                if let Some(value) = self.get(&key) {
                    return Ok(value);
                }

                let guard = BuildGuard { registry: Arc::clone(&self.in_flight), key: key.clone() };
                let entries = Arc::clone(&self.entries);
                let generation = Arc::clone(&self.generation);
                let started_in = generation.load(Ordering::SeqCst);
                let name = self.name;
                let pending = build();

                let task = tokio::spawn(async move {
                    let _guard = guard;
                    let value = Arc::new(pending.await?);
                    entries.insert(
                        key.clone(),
                        Cached { built_at: Instant::now(), value: Arc::clone(&value) },
                    );
                    // Re-checked after the insert so a concurrent clear cannot be missed
                    if generation.load(Ordering::SeqCst) != started_in {
                        entries.remove_if(&key, |_, cached| Arc::ptr_eq(&cached.value, &value));
                        debug!(cache = name, ?key, "Cleared during build, value not stored");
                    }
                    Ok::<_, PaddockError>(value)
                });

                let flight = async move {
                    task.await.unwrap_or_else(|e| {
                        Err(PaddockError::task(format!("aggregate build failed: {}", e)))
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

    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop every cached value. Builds already running answer their waiters
    /// but do not store what they produce.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    /// Evict every value past its TTL, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.built_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    /// Number of stored values, including ones past their TTL.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct BuildGuard<K: Eq + Hash, V> {
    registry: Arc<DashMap<K, SharedBuild<V>>>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for BuildGuard<K, V> {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}
