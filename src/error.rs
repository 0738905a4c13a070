//! Error types for the data-access and analytics layers.
//!
//! All errors implement `std::error::Error`, carry structured context, and expose a
//! stable numeric [`PaddockError::code`] that UI collaborators can show to users
//! instead of raw error chains.
//!
//! ## Error Categories
//!
//! - **Network Errors**: transport failures and request timeouts (retryable)
//! - **HTTP Errors**: non-success upstream status codes (429/5xx retryable)
//! - **Decode Errors**: payloads that do not match the expected model
//! - **Cache Errors**: storage or serialization failures, logged and swallowed
//! - **Service Errors**: annotated failures handed to the UI layer
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use paddock::PaddockError;
//!
//! let error = PaddockError::network("connection reset by peer");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```
//!
//! ## Service Wrapping
//!
//! ```rust
//! use paddock::PaddockError;
//!
//! let raw = PaddockError::http_status(503, "https://api.openf1.org/v1/laps", "");
//! let surfaced = raw.into_service("loading laps for session 9158");
//! assert_eq!(surfaced.code(), 2503);
//! ```

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for paddock operations.
pub type Result<T, E = PaddockError> = std::result::Result<T, E>;

/// Main error type.
///
/// `Clone` so a single in-flight failure can be observed by every caller that
/// joined the same request.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum PaddockError {
    #[error("Network request failed: {reason}")]
    Network {
        reason: String,
        #[source]
        source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Request timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Upstream returned HTTP {status} for {url}")]
    Http { status: u16, url: String, body: String },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Cache {operation} failed: {reason}")]
    Cache { operation: String, reason: String },

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Request queue is closed")]
    QueueClosed,

    #[error("Background task failed: {reason}")]
    Task { reason: String },

    #[error("{context} (error {code})")]
    Service {
        context: String,
        code: u16,
        #[source]
        source: Arc<PaddockError>,
    },
}

impl PaddockError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            PaddockError::Network { .. } => true,
            PaddockError::Timeout { .. } => true,
            PaddockError::Http { status, .. } => *status == 429 || *status >= 500,
            PaddockError::Decode { .. } => false,
            PaddockError::Cache { .. } => false,
            PaddockError::NotFound { .. } => false,
            PaddockError::Config { .. } => false,
            PaddockError::QueueClosed => false,
            PaddockError::Task { .. } => false,
            PaddockError::Service { source, .. } => source.is_retryable(),
        }
    }

    /// Stable numeric identifier shown to users for support requests.
    ///
    /// 1xxx network, 2xxx HTTP (2000 + status), 3xxx data, 4xxx cache,
    /// 5xxx configuration and internal.
    pub fn code(&self) -> u16 {
        match self {
            PaddockError::Network { .. } => 1001,
            PaddockError::Timeout { .. } => 1002,
            PaddockError::Http { status, .. } => 2000 + (*status).min(999),
            PaddockError::Decode { .. } => 3001,
            PaddockError::NotFound { .. } => 3004,
            PaddockError::Cache { .. } => 4001,
            PaddockError::Config { .. } => 5001,
            PaddockError::QueueClosed => 5002,
            PaddockError::Task { .. } => 5003,
            PaddockError::Service { code, .. } => *code,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            PaddockError::Network { .. } => vec![
                "Check the device network connection",
                "Verify the OpenF1 API is reachable",
                "Retry in a few seconds",
            ],
            PaddockError::Timeout { .. } => vec![
                "Retry the request",
                "Narrow the query with session_key or driver_number",
            ],
            PaddockError::Http { status, .. } if *status == 429 => vec![
                "Reduce max_concurrent_requests",
                "Wait before retrying, the upstream is rate limiting",
            ],
            PaddockError::Http { .. } => vec![
                "Check the query parameters",
                "Retry later if the upstream is degraded",
            ],
            PaddockError::Decode { .. } => vec![
                "Clear the cache for this endpoint",
                "Update the library if the upstream schema changed",
            ],
            PaddockError::Cache { .. } => vec![
                "Check the cache directory is writable",
                "Clear the cache to remove corrupt entries",
            ],
            PaddockError::NotFound { .. } => vec![
                "Check the session or driver identifier",
                "Data may not be published yet for this session",
            ],
            PaddockError::Config { .. } => vec![
                "Review the configuration file",
                "Check PADDOCK_* environment overrides",
            ],
            PaddockError::QueueClosed => vec!["Recreate the client"],
            PaddockError::Task { .. } => vec!["Retry the request", "Report the error code"],
            PaddockError::Service { source, .. } => source.recovery_suggestions(),
        }
    }

    /// Wraps this error with user-facing context, preserving its numeric code.
    pub fn into_service(self, context: impl Into<String>) -> Self {
        match self {
            // Don't stack service wrappers; the innermost context is the useful one.
            service @ PaddockError::Service { .. } => service,
            other => PaddockError::Service {
                context: context.into(),
                code: other.code(),
                source: Arc::new(other),
            },
        }
    }

    /// Helper constructor for network errors.
    pub fn network(reason: impl Into<String>) -> Self {
        PaddockError::Network { reason: reason.into(), source: None }
    }

    /// Helper constructor for network errors with source.
    pub fn network_with_source(
        reason: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        let source: Arc<dyn std::error::Error + Send + Sync> = Arc::new(source);
        PaddockError::Network { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for HTTP status errors.
    pub fn http_status(status: u16, url: impl Into<String>, body: impl Into<String>) -> Self {
        PaddockError::Http { status, url: url.into(), body: body.into() }
    }

    /// Helper constructor for decode errors.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        PaddockError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for cache errors.
    pub fn cache(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        PaddockError::Cache { operation: operation.into(), reason: reason.into() }
    }

    /// Helper constructor for failed background tasks.
    pub fn task(reason: impl Into<String>) -> Self {
        PaddockError::Task { reason: reason.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        PaddockError::Config { reason: reason.into() }
    }
}

impl From<serde_json::Error> for PaddockError {
    fn from(err: serde_json::Error) -> Self {
        PaddockError::decode("JSON payload", err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for PaddockError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        PaddockError::config(format!("YAML parsing failed: {}", err))
    }
}

impl From<std::io::Error> for PaddockError {
    fn from(err: std::io::Error) -> Self {
        PaddockError::cache("io", err.to_string())
    }
}
