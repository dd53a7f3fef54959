//! Europe PMC REST API client, used as the abstract fallback.
//!
//! Endpoint: https://www.ebi.ac.uk/europepmc/webservices/rest/search

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::AbstractSource;
use crate::fetcher::{FetchError, Fetcher};

pub const DEFAULT_EPMC_SEARCH_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest/search";

lazy_static! {
    static ref MARKUP: Regex = Regex::new(r"<[^>]+>").expect("static regex");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("static regex");
}

pub struct EuropePmcClient {
    fetcher: Arc<Fetcher>,
    search_url: String,
}

impl EuropePmcClient {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher, search_url: DEFAULT_EPMC_SEARCH_URL.to_string() }
    }

    pub fn with_search_url(mut self, url: &str) -> Self {
        self.search_url = url.to_string();
        self
    }

    #[instrument(skip(self))]
    pub async fn abstract_for_pmid(&self, pmid: &str) -> Result<Option<String>, FetchError> {
        let params = [
            ("query", format!("EXT_ID:{pmid} AND SRC:MED")),
            ("resultType", "core".to_string()),
            ("pageSize", "1".to_string()),
            ("format", "json".to_string()),
        ];

        let resp = self.fetcher.fetch(&self.search_url, &params).await?;
        let text = resp["resultList"]["result"]
            .as_array()
            .and_then(|results| results.first())
            .and_then(|r| r["abstractText"].as_str())
            .map(clean_abstract)
            .filter(|t| !t.is_empty());

        if text.is_none() {
            debug!(pmid, "Europe PMC has no abstract");
        }
        Ok(text)
    }
}

/// Drops inline markup (`<h4>`, `<i>`, ...) and collapses whitespace.
fn clean_abstract(raw: &str) -> String {
    let stripped = MARKUP.replace_all(raw, " ");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

#[async_trait]
impl AbstractSource for EuropePmcClient {
    async fn fetch_abstract(&self, id: &str) -> Result<Option<String>, FetchError> {
        self.abstract_for_pmid(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fetcher_over, RoutedTransport};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_abstract() {
        assert_eq!(
            clean_abstract("<h4>Background</h4>CBT is <i>effective</i>.\n\n  Done."),
            "Background CBT is effective . Done."
        );
    }

    #[tokio::test]
    async fn test_fetches_first_result_abstract() {
        let body = r#"{"resultList": {"result": [{"pmid": "111", "abstractText": "<b>Aim</b> Test."}]}}"#;
        let transport = Arc::new(RoutedTransport::new().route("europepmc", 200, body));
        let client = EuropePmcClient::new(fetcher_over(transport.clone()));

        let text = client.fetch_abstract("111").await.unwrap();
        assert_eq!(text.as_deref(), Some("Aim Test."));
        assert_eq!(transport.param(0, "query").as_deref(), Some("EXT_ID:111 AND SRC:MED"));
    }

    #[tokio::test]
    async fn test_no_result_is_none() {
        let transport = Arc::new(RoutedTransport::new().route("europepmc", 200, r#"{"resultList": {"result": []}}"#));
        let client = EuropePmcClient::new(fetcher_over(transport));
        assert_eq!(client.fetch_abstract("1").await.unwrap(), None);
    }
}
