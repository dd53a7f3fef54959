//! Evidence card repository.
//!
//! Inserts are plain `INSERT`s: the PMID primary key makes a re-run of the
//! same build report duplicates instead of silently overwriting rows.

use async_trait::async_trait;
use pgvector::Vector;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::database::Database;
use crate::error::{DbError, Result};
use crate::schema::{EvidenceCard, TABLE_EVIDENCE_CARDS};

/// Storage for evidence cards.
#[async_trait]
pub trait CardStore: Send + Sync {
    /// Inserts `card`; [`DbError::Duplicate`] when its PMID is already stored.
    async fn insert(&self, card: &EvidenceCard) -> Result<()>;

    async fn exists(&self, pmid: &str) -> Result<bool>;

    async fn count(&self) -> Result<u64>;
}

/// Postgres + pgvector store.
#[derive(Clone)]
pub struct CardRepository {
    db: Arc<Database>,
}

impl CardRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

fn check_dimension(card: &EvidenceCard, expected: usize) -> Result<()> {
    if card.embedding.len() != expected {
        return Err(DbError::InvalidEmbeddingDimension {
            expected,
            actual: card.embedding.len(),
        });
    }
    Ok(())
}

#[async_trait]
impl CardStore for CardRepository {
    async fn insert(&self, card: &EvidenceCard) -> Result<()> {
        check_dimension(card, self.db.embedding_dim())?;

        let sql = format!(
            "INSERT INTO {TABLE_EVIDENCE_CARDS} (
                pmid, doi, category_id, subtopic, title, authors, journal, pub_date,
                publication_types, citations, open_access, concepts, quality_score,
                card_text, embedding, imported_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        );
        let citations = card.citations.map(|c| c.min(i64::MAX as u64) as i64);
        let embedding = Vector::from(card.embedding.clone());

        self.db
            .client()
            .execute(
                &sql,
                &[
                    &card.pmid,
                    &card.doi,
                    &card.category_id,
                    &card.subtopic,
                    &card.title,
                    &card.authors,
                    &card.journal,
                    &card.pub_date,
                    &card.publication_types,
                    &citations,
                    &card.open_access,
                    &card.concepts,
                    &card.quality_score,
                    &card.card_text,
                    &embedding,
                    &card.imported_at,
                ],
            )
            .await
            .map_err(|e| DbError::from_postgres(e, &card.pmid))?;
        Ok(())
    }

    async fn exists(&self, pmid: &str) -> Result<bool> {
        let row = self.db
            .client()
            .query_opt(
                &format!("SELECT 1 FROM {TABLE_EVIDENCE_CARDS} WHERE pmid = $1"),
                &[&pmid],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn count(&self) -> Result<u64> {
        let row = self.db
            .client()
            .query_one(&format!("SELECT COUNT(*) FROM {TABLE_EVIDENCE_CARDS}"), &[])
            .await?;
        let n: i64 = row.get(0);
        Ok(n.max(0) as u64)
    }
}

/// In-process store with the same duplicate semantics, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryCardStore {
    cards: Mutex<BTreeMap<String, EvidenceCard>>,
    dim: Option<usize>,
}

impl MemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce an embedding dimension like the Postgres column does.
    pub fn with_dimension(dim: usize) -> Self {
        Self { dim: Some(dim), ..Self::default() }
    }

    pub fn cards(&self) -> Vec<EvidenceCard> {
        self.cards
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CardStore for MemoryCardStore {
    async fn insert(&self, card: &EvidenceCard) -> Result<()> {
        if let Some(dim) = self.dim {
            check_dimension(card, dim)?;
        }
        let mut cards = self.cards.lock().unwrap_or_else(|p| p.into_inner());
        if cards.contains_key(&card.pmid) {
            return Err(DbError::Duplicate(card.pmid.clone()));
        }
        cards.insert(card.pmid.clone(), card.clone());
        Ok(())
    }

    async fn exists(&self, pmid: &str) -> Result<bool> {
        Ok(self.cards.lock().unwrap_or_else(|p| p.into_inner()).contains_key(pmid))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.cards.lock().unwrap_or_else(|p| p.into_inner()).len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(pmid: &str, dim: usize) -> EvidenceCard {
        EvidenceCard {
            pmid: pmid.to_string(),
            doi: None,
            category_id: "anxiety".into(),
            subtopic: "gad".into(),
            title: "T".into(),
            authors: "A".into(),
            journal: None,
            pub_date: Some("2021".into()),
            publication_types: vec!["Meta-Analysis".into()],
            citations: Some(3),
            open_access: false,
            concepts: vec![],
            quality_score: 0.5,
            card_text: "card".into(),
            embedding: vec![0.0; dim],
            imported_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_rejects_duplicate_pmid() {
        let store = MemoryCardStore::new();
        tokio_test::assert_ok!(store.insert(&card("1", 4)).await);
        let err = store.insert(&card("1", 4)).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.exists("1").await.unwrap());
        assert!(!store.exists("2").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_checks_dimension() {
        let store = MemoryCardStore::with_dimension(4);
        let err = store.insert(&card("1", 3)).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidEmbeddingDimension { expected: 4, actual: 3 }));
    }
}
