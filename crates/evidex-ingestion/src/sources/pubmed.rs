//! PubMed E-utilities client.
//!
//! Endpoints used:
//!   esearch:  identifiers for a term within a publication-date window
//!   esummary: bibliographic summaries for up to 200 identifiers per call

use async_trait::async_trait;
use evidex_common::DateRange;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use super::{MetadataSource, SearchSource};
use crate::fetcher::{FetchError, Fetcher};
use crate::models::PaperMetadata;

pub const DEFAULT_EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// esummary rejects larger id lists.
pub const ESUMMARY_BATCH_LIMIT: usize = 200;

pub struct PubMedClient {
    fetcher: Arc<Fetcher>,
    base_url: String,
    api_key: Option<String>,
}

impl PubMedClient {
    pub fn new(fetcher: Arc<Fetcher>, api_key: Option<String>) -> Self {
        Self {
            fetcher,
            base_url: DEFAULT_EUTILS_BASE.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn base_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("db", "pubmed".to_string()),
            ("retmode", "json".to_string()),
        ];
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Search PubMed within a publication-date window and return PMIDs.
    #[instrument(skip(self, range), fields(range = %range.name))]
    pub async fn esearch(&self, query: &str, range: &DateRange, max: usize) -> Result<Vec<String>, FetchError> {
        let (mindate, maxdate) = range.pubmed_bounds();
        let mut params = self.base_params();
        params.push(("term", query.to_string()));
        params.push(("retmax", max.to_string()));
        params.push(("datetype", "pdat".to_string()));
        params.push(("mindate", mindate));
        params.push(("maxdate", maxdate));

        let resp = self.fetcher
            .fetch(&format!("{}/esearch.fcgi", self.base_url), &params)
            .await?;

        let ids: Vec<String> = resp["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| ids.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();

        debug!(count = ids.len(), "PubMed esearch returned PMIDs");
        Ok(ids)
    }

    /// Fetch esummary records for at most [`ESUMMARY_BATCH_LIMIT`] PMIDs.
    #[instrument(skip(self, pmids), fields(n = pmids.len()))]
    pub async fn esummary(&self, pmids: &[String]) -> Result<Vec<PaperMetadata>, FetchError> {
        if pmids.is_empty() {
            return Ok(vec![]);
        }
        if pmids.len() > ESUMMARY_BATCH_LIMIT {
            return Err(FetchError::InvalidRequest(format!(
                "esummary accepts at most {ESUMMARY_BATCH_LIMIT} ids, got {}",
                pmids.len()
            )));
        }

        let mut params = self.base_params();
        params.push(("id", pmids.join(",")));

        let resp = self.fetcher
            .fetch(&format!("{}/esummary.fcgi", self.base_url), &params)
            .await?;

        Ok(parse_esummary(&resp))
    }
}

/// Records in `result.uids` order; uids flagged with an `error` are skipped.
fn parse_esummary(resp: &serde_json::Value) -> Vec<PaperMetadata> {
    let result = &resp["result"];
    let uids = result["uids"].as_array().cloned().unwrap_or_default();

    uids.iter()
        .filter_map(|uid| uid.as_str())
        .filter_map(|uid| {
            let doc = &result[uid];
            if !doc.is_object() || doc.get("error").is_some() {
                warn!(pmid = uid, "esummary has no record for PMID");
                return None;
            }

            let authors = doc["authors"]
                .as_array()
                .map(|list| {
                    list.iter()
                        .filter_map(|a| a["name"].as_str())
                        .filter(|name| !name.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default();

            let journal = non_empty(doc["fulljournalname"].as_str())
                .or_else(|| non_empty(doc["source"].as_str()));

            let doi = doc["articleids"].as_array().and_then(|ids| {
                ids.iter()
                    .find(|id| id["idtype"].as_str() == Some("doi"))
                    .and_then(|id| non_empty(id["value"].as_str()))
            });

            let publication_types = doc["pubtype"]
                .as_array()
                .map(|types| types.iter().filter_map(|t| t.as_str().map(String::from)).collect())
                .unwrap_or_default();

            Some(PaperMetadata {
                pmid: uid.to_string(),
                doi,
                title: doc["title"].as_str().unwrap_or("").trim().to_string(),
                authors,
                journal,
                pub_date: non_empty(doc["pubdate"].as_str()),
                publication_types,
            })
        })
        .collect()
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

#[async_trait]
impl SearchSource for PubMedClient {
    async fn search_ids(&self, query: &str, range: &DateRange, max_results: usize) -> Result<Vec<String>, FetchError> {
        self.esearch(query, range, max_results).await
    }
}

#[async_trait]
impl MetadataSource for PubMedClient {
    fn batch_limit(&self) -> usize {
        ESUMMARY_BATCH_LIMIT
    }

    async fn fetch_metadata(&self, ids: &[String]) -> Result<Vec<PaperMetadata>, FetchError> {
        self.esummary(ids).await
    }
}
