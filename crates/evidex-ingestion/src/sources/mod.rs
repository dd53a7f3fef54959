//! Bibliographic source adapters.
//!
//! Each external service sits behind a narrow trait so the pipeline can run
//! against fakes in tests. The live implementations share one [`Fetcher`].

pub mod europepmc;
pub mod openalex;
pub mod pubmed;

use async_trait::async_trait;
use evidex_common::{CitationMetrics, DateRange};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::fetcher::{FetchError, Fetcher};
use crate::models::PaperMetadata;

use europepmc::EuropePmcClient;
use openalex::OpenAlexClient;
use pubmed::PubMedClient;

/// Query + date window → identifiers, in source relevance order.
#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search_ids(
        &self,
        query: &str,
        range: &DateRange,
        max_results: usize,
    ) -> Result<Vec<String>, FetchError>;
}

/// Identifier batch → bibliographic records. Unknown identifiers are omitted.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Largest batch a single call accepts.
    fn batch_limit(&self) -> usize;

    async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<PaperMetadata>, FetchError>;
}

/// Identifier → citation metrics; an identifier the graph does not know
/// yields [`CitationMetrics::unknown`] rather than an error.
#[async_trait]
pub trait CitationSource: Send + Sync {
    async fn citation_metrics(&self, id: &str) -> Result<CitationMetrics, FetchError>;
}

/// Identifier → plain-text abstract, `None` when there is none.
#[async_trait]
pub trait AbstractSource: Send + Sync {
    async fn fetch_abstract(&self, id: &str) -> Result<Option<String>, FetchError>;
}

/// The four sources one corpus build reads from.
#[derive(Clone)]
pub struct SourceSet {
    pub search: Arc<dyn SearchSource>,
    pub metadata: Arc<dyn MetadataSource>,
    pub citations: Arc<dyn CitationSource>,
    pub abstracts: Arc<dyn AbstractSource>,
}

impl SourceSet {
    /// PubMed for search and metadata, OpenAlex for citations, Europe PMC for
    /// abstracts, all through one fetcher.
    pub fn live(fetcher: Arc<Fetcher>, cfg: &SourcesConfig) -> Self {
        let pubmed = Arc::new(
            PubMedClient::new(fetcher.clone(), cfg.ncbi_api_key.clone())
                .with_base_url(&cfg.pubmed_base_url),
        );
        Self {
            search: pubmed.clone(),
            metadata: pubmed,
            citations: Arc::new(
                OpenAlexClient::new(fetcher.clone(), cfg.openalex_mailto.clone())
                    .with_base_url(&cfg.openalex_base_url),
            ),
            abstracts: Arc::new(EuropePmcClient::new(fetcher).with_search_url(&cfg.europepmc_search_url)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_pubmed_base_url")]
    pub pubmed_base_url: String,
    /// Raises the NCBI rate ceiling when set. Usually supplied via env.
    #[serde(default)]
    pub ncbi_api_key: Option<String>,
    #[serde(default = "default_openalex_base_url")]
    pub openalex_base_url: String,
    /// Contact address for the OpenAlex polite pool.
    #[serde(default)]
    pub openalex_mailto: Option<String>,
    #[serde(default = "default_europepmc_search_url")]
    pub europepmc_search_url: String,
    /// Identifier cap per (sub-query, date range) search.
    #[serde(default = "default_max_results_per_query")]
    pub max_results_per_query: usize,
}

fn default_pubmed_base_url() -> String { pubmed::DEFAULT_EUTILS_BASE.to_string() }
fn default_openalex_base_url() -> String { openalex::DEFAULT_OPENALEX_BASE.to_string() }
fn default_europepmc_search_url() -> String { europepmc::DEFAULT_EPMC_SEARCH_URL.to_string() }
fn default_max_results_per_query() -> usize { 200 }

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pubmed_base_url: default_pubmed_base_url(),
            ncbi_api_key: None,
            openalex_base_url: default_openalex_base_url(),
            openalex_mailto: None,
            europepmc_search_url: default_europepmc_search_url(),
            max_results_per_query: default_max_results_per_query(),
        }
    }
}
