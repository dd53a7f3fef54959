//! Evidex Database Layer
//!
//! Evidence cards live in a single Postgres table with a pgvector column,
//! keyed by PMID.
//!
//! # Example
//!
//! ```rust,no_run
//! use evidex_db::{CardRepository, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/evidex", 1536).await?;
//!     db.initialize().await?;
//!
//!     let cards = CardRepository::new(std::sync::Arc::new(db));
//!
//!     Ok(())
//! }
//! ```

pub mod cards;
pub mod database;
pub mod error;
pub mod schema;

pub use cards::{CardRepository, CardStore, MemoryCardStore};
pub use database::{Database, DatabaseStats};
pub use error::{DbError, Result};
pub use schema::{EvidenceCard, EMBEDDING_DIM, TABLE_EVIDENCE_CARDS};
