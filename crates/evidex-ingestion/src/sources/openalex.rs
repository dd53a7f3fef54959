//! OpenAlex citation-graph client.
//!
//! Endpoint: https://api.openalex.org/works/pmid:{pmid}

use async_trait::async_trait;
use evidex_common::CitationMetrics;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::CitationSource;
use crate::fetcher::{FetchError, Fetcher};

pub const DEFAULT_OPENALEX_BASE: &str = "https://api.openalex.org";

/// Concept labels kept per work.
pub const MAX_CONCEPTS: usize = 5;

pub struct OpenAlexClient {
    fetcher: Arc<Fetcher>,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexClient {
    pub fn new(fetcher: Arc<Fetcher>, mailto: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: DEFAULT_OPENALEX_BASE.to_string(),
            mailto,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[instrument(skip(self))]
    pub async fn work_by_pmid(&self, pmid: &str) -> Result<CitationMetrics, FetchError> {
        let mut params = Vec::new();
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.clone()));
        }

        let url = format!("{}/works/pmid:{}", self.base_url, pmid);
        match self.fetcher.fetch(&url, &params).await {
            Ok(work) => Ok(parse_work(&work)),
            Err(e) if e.is_not_found() => {
                debug!(pmid, "OpenAlex has no work for PMID");
                Ok(CitationMetrics::unknown())
            }
            Err(e) => Err(e),
        }
    }
}

fn parse_work(work: &serde_json::Value) -> CitationMetrics {
    let concepts = work["concepts"]
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|c| c["display_name"].as_str())
                .take(MAX_CONCEPTS)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    CitationMetrics {
        citation_count: work["cited_by_count"].as_u64(),
        open_access: work["open_access"]["is_oa"].as_bool().unwrap_or(false),
        concepts,
    }
}

#[async_trait]
impl CitationSource for OpenAlexClient {
    async fn citation_metrics(&self, id: &str) -> Result<CitationMetrics, FetchError> {
        self.work_by_pmid(id).await
    }
}
