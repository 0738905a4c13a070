//! Resilient data access
//!
//! # Architecture
//!
//! The fetch layer is built from small owned components, composed by [`Fetcher`]:
//! - [`RequestQueue`] bounds concurrent upstream calls (fair, FIFO)
//! - [`DurableCache`] keeps payloads in a [`KeyValueStore`] across restarts
//! - [`Upstream`] performs single HTTP attempts ([`HttpUpstream`])
//! - [`Fetcher`] adds single-flight deduplication, retry with exponential
//!   backoff, and stale-on-error degradation
//!
//! Every component is an explicit value. Nothing here is process-global, so tests
//! and multiple clients can hold isolated instances.

pub mod cache;
pub mod fingerprint;
pub mod orchestrator;
pub mod queue;
pub mod store;
pub mod upstream;

pub use cache::{CacheEntry, CacheTtl, DurableCache, Freshness};
pub use fingerprint::{Fingerprint, QueryParams};
pub use orchestrator::{FetchOptions, Fetcher};
pub use queue::{RequestPermit, RequestQueue};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use upstream::{HttpUpstream, Upstream};
