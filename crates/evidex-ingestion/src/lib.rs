//! evidex-ingestion — evidence corpus build.
//! - Rate-limited, cached, retrying fetcher for the bibliographic APIs
//! - Source adapters: PubMed search + summaries, OpenAlex citations,
//!   Europe PMC abstracts
//! - Recall with first-write-wins subtopic assignment
//! - Card rendering, embedding, and idempotent persistence
//! - The orchestrating pipeline

pub mod cache;
pub mod card;
pub mod embedding;
pub mod fetcher;
pub mod models;
pub mod pipeline;
pub mod recall;
pub mod repository;
pub mod retry;
pub mod sources;

#[cfg(test)]
mod testing;

pub use embedding::{Embedder, EmbeddingBackend, EmbeddingClient, EmbeddingConfig};
pub use fetcher::{FetchError, Fetcher, FetcherConfig};
pub use pipeline::{CategoryReport, CorpusPipeline, PipelineSettings, RunReport, SelectedPaper};
pub use repository::{IngestionRepository, PersistOutcome};
pub use retry::RetryPolicy;
pub use sources::{SourceSet, SourcesConfig};
