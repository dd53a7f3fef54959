//! evidex-common — Shared types, errors, and configuration used across all Evidex crates.

pub mod error;
pub mod entities;
pub mod category_config;
pub mod sandbox;

// Re-export commonly used types
pub use category_config::{CategoryConfig, CategorySet, DateRange, SubQuery};
pub use entities::{CandidateRecord, CitationMetrics, ScoredCandidate};
pub use error::{EvidexError, Result};
