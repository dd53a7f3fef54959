//! Card embeddings.
//!
//! Backends:
//!   - `openai`             hosted `/v1/embeddings`, key required
//!   - `openai_compatible`  any `/v1/embeddings` endpoint at `base_url`
//!   - `ollama`             `/api/embeddings`, one prompt per request

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use evidex_common::sandbox::SandboxClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const OPENAI_BASE: &str = "https://api.openai.com";
const LOCAL_BASE: &str = "http://localhost:11434";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,
    /// Usually supplied through `EVIDEX_EMBEDDING_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    /// Length every returned vector must have.
    #[serde(default = "default_dim")]
    pub dim: usize,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingBackend {
    #[default]
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
    #[serde(rename = "ollama")]
    Ollama,
}

fn default_model() -> String { "text-embedding-3-small".to_string() }
fn default_dim() -> usize { evidex_db::EMBEDDING_DIM }

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            api_key: None,
            model: default_model(),
            dim: default_dim(),
            base_url: None,
        }
    }
}

/// Text to a vector of exactly [`Embedder::dim`] components.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

pub struct EmbeddingClient {
    cfg: EmbeddingConfig,
    client: SandboxClient,
    endpoint: String,
}

impl EmbeddingClient {
    /// The host of a configured `base_url` is added to the allowlist.
    pub fn new(cfg: EmbeddingConfig, mut client: SandboxClient) -> Result<Self> {
        if let Some(base) = &cfg.base_url {
            client.allow_url_host(base)?;
        }
        let endpoint = endpoint_for(&cfg);
        Ok(Self { cfg, client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// One vector per input, in input order.
    #[instrument(skip(self, texts), fields(n = texts.len(), backend = ?self.cfg.backend))]
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let vectors = match self.cfg.backend {
            EmbeddingBackend::OpenAi | EmbeddingBackend::OpenAiCompatible => self.request_openai_style(texts).await?,
            EmbeddingBackend::Ollama => self.request_ollama(texts).await?,
        };
        if vectors.len() != texts.len() {
            bail!("embedding service returned {} vectors for {} inputs", vectors.len(), texts.len());
        }
        for v in &vectors {
            check_dim(v, self.cfg.dim)?;
        }
        debug!(n = vectors.len(), dim = self.cfg.dim, "Embedded");
        Ok(vectors)
    }

    async fn request_openai_style(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let key = self.cfg.api_key.as_deref().filter(|k| !k.is_empty());
        if self.cfg.backend == EmbeddingBackend::OpenAi && key.is_none() {
            bail!("the openai embedding backend needs embedding.api_key or EVIDEX_EMBEDDING_API_KEY");
        }
        let mut req = self
            .client
            .post(&self.endpoint)?
            .json(&serde_json::json!({ "model": &self.cfg.model, "input": texts }));
        if let Some(key) = key {
            req = req.bearer_auth(key);
        }
        let resp: serde_json::Value = req
            .send()
            .await
            .with_context(|| format!("embedding service unreachable at {}", self.endpoint))?
            .error_for_status()?
            .json()
            .await?;
        parse_openai_embeddings(&resp)
    }

    async fn request_ollama(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let resp: serde_json::Value = self
                .client
                .post(&self.endpoint)?
                .json(&serde_json::json!({ "model": &self.cfg.model, "prompt": text }))
                .send()
                .await
                .with_context(|| format!("Ollama unreachable at {}", self.endpoint))?
                .error_for_status()?
                .json()
                .await?;
            out.push(parse_vector(&resp["embedding"])?);
        }
        Ok(out)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    fn dim(&self) -> usize {
        self.cfg.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().context("embedding service returned no vector")
    }
}

fn endpoint_for(cfg: &EmbeddingConfig) -> String {
    let base = cfg.base_url.as_deref().map(|b| b.trim_end_matches('/'));
    match cfg.backend {
        EmbeddingBackend::OpenAi => format!("{}/v1/embeddings", base.unwrap_or(OPENAI_BASE)),
        EmbeddingBackend::OpenAiCompatible => format!("{}/v1/embeddings", base.unwrap_or(LOCAL_BASE)),
        EmbeddingBackend::Ollama => format!("{}/api/embeddings", base.unwrap_or(LOCAL_BASE)),
    }
}

fn check_dim(v: &[f32], expected: usize) -> Result<()> {
    if v.len() != expected {
        bail!("embedding dimension mismatch: expected {expected}, got {}", v.len());
    }
    Ok(())
}

fn parse_vector(value: &serde_json::Value) -> Result<Vec<f32>> {
    let items = value.as_array().context("embedding is not an array")?;
    items
        .iter()
        .map(|v| v.as_f64().map(|x| x as f32).context("embedding component is not a number"))
        .collect()
}

/// `data[i].embedding`, ordered by `data[i].index` when present.
fn parse_openai_embeddings(resp: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let mut rows: Vec<(u64, Vec<f32>)> = resp["data"]
        .as_array()
        .context("embedding response has no data array")?
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let index = item["index"].as_u64().unwrap_or(i as u64);
            parse_vector(&item["embedding"]).map(|v| (index, v))
        })
        .collect::<Result<_>>()?;
    rows.sort_by_key(|(index, _)| *index);
    Ok(rows.into_iter().map(|(_, v)| v).collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
