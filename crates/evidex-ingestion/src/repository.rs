//! Persistence writer for evidence cards.
//!
//! A card whose PMID is already stored is reported as skipped, not as an
//! error, so re-running a build is harmless.

use evidex_db::{CardStore, DbError, EvidenceCard};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    /// The PMID was imported earlier.
    Skipped,
}

#[derive(Clone)]
pub struct IngestionRepository {
    store: Arc<dyn CardStore>,
}

impl IngestionRepository {
    pub fn new(store: Arc<dyn CardStore>) -> Self {
        Self { store }
    }

    pub async fn persist(&self, card: &EvidenceCard) -> Result<PersistOutcome, DbError> {
        match self.store.insert(card).await {
            Ok(()) => {
                debug!(pmid = %card.pmid, category = %card.category_id, "Card inserted");
                Ok(PersistOutcome::Inserted)
            }
            Err(e) if e.is_duplicate() => {
                info!(pmid = %card.pmid, category = %card.category_id, "Already imported, skipping");
                Ok(PersistOutcome::Skipped)
            }
            Err(e) => Err(e),
        }
    }

    /// True when a card for `pmid` is already stored.
    pub async fn already_imported(&self, pmid: &str) -> Result<bool, DbError> {
        self.store.exists(pmid).await
    }

    pub async fn card_count(&self) -> Result<u64, DbError> {
        self.store.count().await
    }
}
