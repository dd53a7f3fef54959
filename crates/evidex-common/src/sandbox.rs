use reqwest::{Client, ClientBuilder};
use std::collections::HashSet;
use std::time::Duration;
use url::Url;
use crate::error::EvidexError;

/// Hosts every outbound call is allowed to reach by default.
const DEFAULT_ALLOWLIST: &[&str] = &[
    "eutils.ncbi.nlm.nih.gov", // PubMed E-utilities
    "api.openalex.org",        // OpenAlex citation graph
    "www.ebi.ac.uk",           // Europe PMC
    "api.openai.com",          // Embeddings
    "localhost",               // Ollama / local embedding services
    "127.0.0.1",
];

/// An HTTP client that only allows requests to approved domains.
///
/// Every network call the pipeline makes (bibliographic sources and the
/// embedding service) goes through one of these, so a typo in a configured
/// base URL fails loudly instead of sending traffic somewhere unexpected.
#[derive(Debug, Clone)]
pub struct SandboxClient {
    client: Client,
    allowlist: HashSet<String>,
}

impl SandboxClient {
    /// Creates a client with the default allowlist and a 30 s transport timeout.
    pub fn new() -> Result<Self, EvidexError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Creates a client with the default allowlist and the given transport timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, EvidexError> {
        let client = ClientBuilder::new()
            .timeout(timeout)
            .user_agent(concat!("evidex/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EvidexError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let allowlist = DEFAULT_ALLOWLIST.iter().map(|d| d.to_string()).collect();
        Ok(Self { client, allowlist })
    }

    /// Appends an exact hostname to the allowlist.
    pub fn allow_domain(&mut self, domain: &str) {
        self.allowlist.insert(domain.to_string());
    }

    /// Allows the host of a configured base URL (e.g. a self-hosted embedding endpoint).
    pub fn allow_url_host(&mut self, url: &str) -> Result<(), EvidexError> {
        let parsed = Url::parse(url)
            .map_err(|e| EvidexError::Config(format!("invalid URL {url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| EvidexError::Config(format!("URL has no host: {url}")))?;
        self.allow_domain(host);
        Ok(())
    }

    /// Validates if a URL is permitted under the current sandbox policy.
    pub fn is_allowed(&self, url: &str) -> bool {
        if let Ok(parsed) = Url::parse(url) {
            if let Some(host) = parsed.host_str() {
                // Exact match or subdomain of an allowed domain
                for allowed in &self.allowlist {
                    if host == allowed || host.ends_with(&format!(".{}", allowed)) {
                        return true;
                    }
                }
            }
        }
        false
    }

    pub fn get(&self, url: &str) -> Result<reqwest::RequestBuilder, EvidexError> {
        self.request(reqwest::Method::GET, url)
    }

    pub fn post(&self, url: &str) -> Result<reqwest::RequestBuilder, EvidexError> {
        self.request(reqwest::Method::POST, url)
    }

    pub fn request(&self, method: reqwest::Method, url: &str) -> Result<reqwest::RequestBuilder, EvidexError> {
        if !self.is_allowed(url) {
            tracing::warn!(url, "Blocked request to host outside the allowlist");
            return Err(EvidexError::SecurityError(format!(
                "Network capabilities capped: domain not in allowlist for URL {}",
                url
            )));
        }

        Ok(self.client.request(method, url))
    }
}
