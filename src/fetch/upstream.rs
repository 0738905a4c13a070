//! Upstream transport

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::fingerprint::QueryParams;
use crate::{PaddockError, Result};

/// Source of raw JSON payloads.
///
/// The orchestrator owns retries, caching, and admission control; an upstream
/// performs exactly one attempt per call.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    /// Perform a single GET of `path` with `params`.
    async fn get(&self, path: &str, params: &QueryParams) -> Result<Value>;
}

/// HTTP upstream against the OpenF1 REST API.
#[derive(Debug, Clone)]
pub struct HttpUpstream {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(4)
            .timeout(timeout)
            .build()
            .map_err(|e| PaddockError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string(), timeout })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn get(&self, path: &str, params: &QueryParams) -> Result<Value> {
        let url = self.url(path);
        debug!(url = %url, query = %params.to_query_string(), "GET");

        let response =
            self.client.get(&url).query(&params.pairs()).send().await.map_err(|e| {
                if e.is_timeout() {
                    PaddockError::Timeout { duration: self.timeout }
                } else {
                    PaddockError::network_with_source(format!("GET {}", path), e)
                }
            })?;

        let status = response.status().as_u16();
        // OpenF1 answers 404 when a filter matches no rows
        if status == 404 {
            debug!(url = %url, "No rows for query");
            return Ok(Value::Array(Vec::new()));
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PaddockError::http_status(
                status,
                url,
                body.chars().take(500).collect::<String>(),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                PaddockError::Timeout { duration: self.timeout }
            } else {
                PaddockError::decode(format!("GET {}", path), e.to_string())
            }
        })
    }
}
