//! Canned-response transport for adapter tests.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::fetcher::{FetchError, Fetcher, FetcherConfig, Transport, TransportResponse};
use crate::retry::RetryPolicy;

/// Answers every GET whose URL contains a registered fragment.
#[derive(Default)]
pub struct RoutedTransport {
    routes: Vec<(String, u16, String)>,
    requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl RoutedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: &str, status: u16, body: &str) -> Self {
        self.routes.push((fragment.to_string(), status, body.to_string()));
        self
    }

    /// `(url, params)` of every request seen so far.
    pub fn requests(&self) -> Vec<(String, Vec<(String, String)>)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn param(&self, index: usize, name: &str) -> Option<String> {
        self.requests()
            .get(index)?
            .1
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

#[async_trait]
impl Transport for RoutedTransport {
    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<TransportResponse, FetchError> {
        self.requests.lock().unwrap().push((
            endpoint.to_string(),
            params.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
        ));
        self.routes
            .iter()
            .find(|(fragment, _, _)| endpoint.contains(fragment.as_str()))
            .map(|(_, status, body)| TransportResponse { status: *status, body: body.clone() })
            .ok_or_else(|| FetchError::Transport {
                endpoint: endpoint.to_string(),
                message: "no route".to_string(),
            })
    }
}

/// Fetcher with no spacing, no jitter and a single attempt.
pub fn fetcher_over(transport: Arc<RoutedTransport>) -> Arc<Fetcher> {
    let cfg = FetcherConfig {
        min_spacing_ms: 0,
        retry: RetryPolicy { max_attempts: 1, base_delay_ms: 0, max_jitter_ms: 0 },
        ..Default::default()
    };
    Arc::new(Fetcher::new(&cfg, transport))
}
