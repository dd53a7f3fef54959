//! Rate-limited, cached, retrying HTTP fetcher.
//!
//! Every source adapter goes through one shared [`Fetcher`]. Per request it:
//!   1. answers from the response cache when a fresh entry exists
//!   2. takes one of `max_concurrency` in-flight slots
//!   3. waits until `min_spacing` has passed since the previous dispatch
//!   4. retries timeouts and 5xx responses with exponential backoff
//!   5. caches the decoded JSON on success
//!
//! The slot is held for the whole retry sequence, backoff sleeps included, so
//! a struggling upstream cannot be hit by more than `max_concurrency` callers.

use async_trait::async_trait;
use evidex_common::sandbox::SandboxClient;
use evidex_common::EvidexError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::cache::ResponseCache;
use crate::retry::RetryPolicy;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("{endpoint} returned server error {status}: {body}")]
    Server { endpoint: String, status: u16, body: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Http { endpoint: String, status: u16, body: String },

    #[error("transport failure for {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Sandbox(#[from] EvidexError),
}

impl FetchError {
    /// Timeouts and 5xx responses are worth another attempt; everything else
    /// is permanent.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Timeout { .. } | FetchError::Server { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Server { status, .. } | FetchError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_min_spacing_ms")]
    pub min_spacing_ms: u64,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Per-attempt deadline.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_max_concurrency() -> usize { 2 }
fn default_min_spacing_ms() -> u64 { 350 }
fn default_cache_ttl_secs() -> u64 { 86_400 }
fn default_request_timeout_secs() -> u64 { 20 }

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            min_spacing_ms: default_min_spacing_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            retry: RetryPolicy::default(),
        }
    }
}

// ── Transport ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// One raw GET. Implementations report transport-level failures only; status
/// handling belongs to [`Fetcher`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<TransportResponse, FetchError>;
}

/// Production transport over the allowlisted HTTP client.
pub struct HttpTransport {
    client: SandboxClient,
}

impl HttpTransport {
    pub fn new(client: SandboxClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<TransportResponse, FetchError> {
        let response = self.client
            .get(endpoint)?
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout { endpoint: endpoint.to_string() }
                } else {
                    FetchError::Transport { endpoint: endpoint.to_string(), message: e.to_string() }
                }
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| FetchError::Transport {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        Ok(TransportResponse { status, body })
    }
}

// ── Scheduler ─────────────────────────────────────────────────────────────────

/// Bounds in-flight requests and spaces consecutive dispatches.
#[derive(Debug)]
pub struct Scheduler {
    slots: Semaphore,
    min_spacing: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl Scheduler {
    pub fn new(max_concurrency: usize, min_spacing: Duration) -> Self {
        Self {
            slots: Semaphore::new(max_concurrency.max(1)),
            min_spacing,
            last_dispatch: Mutex::new(None),
        }
    }

    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, FetchError> {
        self.slots
            .acquire()
            .await
            .map_err(|_| FetchError::InvalidRequest("fetcher is shut down".to_string()))
    }

    /// Waits until `min_spacing` has elapsed since the last dispatch, then
    /// records now as the new dispatch time.
    pub async fn pace(&self) {
        let mut last = self.last_dispatch.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_spacing;
            if ready_at > Instant::now() {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}

// ── Fetcher ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub network_calls: u64,
    pub cache_hits: u64,
}

pub struct Fetcher {
    transport: Arc<dyn Transport>,
    cache: ResponseCache,
    scheduler: Scheduler,
    retry: RetryPolicy,
    request_timeout: Duration,
    network_calls: AtomicU64,
    cache_hits: AtomicU64,
}

impl Fetcher {
    pub fn new(cfg: &FetcherConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cache: ResponseCache::new(Duration::from_secs(cfg.cache_ttl_secs)),
            scheduler: Scheduler::new(cfg.max_concurrency, Duration::from_millis(cfg.min_spacing_ms)),
            retry: cfg.retry.clone(),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            network_calls: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
        }
    }

    /// Fetcher over the allowlisted HTTP client.
    pub fn http(cfg: &FetcherConfig, client: SandboxClient) -> Self {
        Self::new(cfg, Arc::new(HttpTransport::new(client)))
    }

    /// GET `endpoint` with `params` and decode the body as JSON.
    #[instrument(skip(self, params))]
    pub async fn fetch(&self, endpoint: &str, params: &[(&str, String)]) -> Result<serde_json::Value, FetchError> {
        let key = cache_key(endpoint, params);
        if let Some(hit) = self.cache.get(&key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Cache hit");
            return Ok(hit);
        }

        let _slot = self.scheduler.acquire().await?;
        let payload = self.retry
            .run(move |_| self.attempt(endpoint, params), FetchError::is_retryable)
            .await?;

        self.cache.insert(key, payload.clone());
        Ok(payload)
    }

    async fn attempt(&self, endpoint: &str, params: &[(&str, String)]) -> Result<serde_json::Value, FetchError> {
        self.scheduler.pace().await;
        self.network_calls.fetch_add(1, Ordering::Relaxed);

        let response = tokio::time::timeout(self.request_timeout, self.transport.get(endpoint, params))
            .await
            .map_err(|_| FetchError::Timeout { endpoint: endpoint.to_string() })??;

        match response.status {
            200..=299 => serde_json::from_str(&response.body).map_err(|e| FetchError::Decode {
                endpoint: endpoint.to_string(),
                message: e.to_string(),
            }),
            500..=599 => Err(FetchError::Server {
                endpoint: endpoint.to_string(),
                status: response.status,
                body: response.body,
            }),
            status => Err(FetchError::Http {
                endpoint: endpoint.to_string(),
                status,
                body: response.body,
            }),
        }
    }

    pub fn stats(&self) -> FetchStats {
        FetchStats {
            network_calls: self.network_calls.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
        }
    }
}

/// Endpoint plus parameters in a stable order.
fn cache_key(endpoint: &str, params: &[(&str, String)]) -> String {
    let mut sorted: Vec<&(&str, String)> = params.iter().collect();
    sorted.sort();
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(sorted.iter().map(|(k, v)| (*k, v.as_str())))
        .finish();
    format!("{endpoint}?{query}")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
