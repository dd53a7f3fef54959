//! Schema definitions for the evidence store.
//!
//! One table, keyed by PMID, with a pgvector column for the card embedding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Dimension of `text-embedding-3-small`, the default embedding model.
pub const EMBEDDING_DIM: usize = 1536;

pub const TABLE_EVIDENCE_CARDS: &str = "evidence_cards";

// =============================================================================
// Evidence card
// =============================================================================

/// One persisted evidence card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCard {
    pub pmid: String,
    pub doi: Option<String>,
    pub category_id: String,
    pub subtopic: String,
    pub title: String,
    pub authors: String,
    pub journal: Option<String>,
    pub pub_date: Option<String>,
    pub publication_types: Vec<String>,
    /// `None` when the citation graph had no record.
    pub citations: Option<u64>,
    pub open_access: bool,
    pub concepts: Vec<String>,
    pub quality_score: f64,
    pub card_text: String,
    pub embedding: Vec<f32>,
    pub imported_at: DateTime<Utc>,
}

/// `CREATE` statements for a vector column of `dim` dimensions.
pub fn create_statements(dim: usize) -> Vec<String> {
    vec![
        "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_EVIDENCE_CARDS} (
                pmid              TEXT PRIMARY KEY,
                doi               TEXT,
                category_id       TEXT NOT NULL,
                subtopic          TEXT NOT NULL,
                title             TEXT NOT NULL,
                authors           TEXT NOT NULL,
                journal           TEXT,
                pub_date          TEXT,
                publication_types TEXT[] NOT NULL,
                citations         BIGINT,
                open_access       BOOLEAN NOT NULL,
                concepts          TEXT[] NOT NULL,
                quality_score     DOUBLE PRECISION NOT NULL,
                card_text         TEXT NOT NULL,
                embedding         vector({dim}) NOT NULL,
                imported_at       TIMESTAMPTZ NOT NULL
            )"
        ),
        format!(
            "CREATE INDEX IF NOT EXISTS {TABLE_EVIDENCE_CARDS}_category_idx \
             ON {TABLE_EVIDENCE_CARDS} (category_id)"
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_statements_use_dimension() {
        let stmts = create_statements(768);
        assert_eq!(stmts.len(), 3);
        assert!(stmts[1].contains("vector(768)"));
        assert!(stmts[1].contains("pmid              TEXT PRIMARY KEY"));
    }
}
