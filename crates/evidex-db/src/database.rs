//! Database connection and table management.

use crate::error::Result;
use crate::schema;
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

/// Main database handle.
pub struct Database {
    client: Client,
    embedding_dim: usize,
}

impl Database {
    /// Connect to Postgres. The connection task is driven on the runtime.
    pub async fn connect(url: &str, embedding_dim: usize) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Postgres connection closed: {e}");
            }
        });
        Ok(Self { client, embedding_dim })
    }

    /// Get the underlying client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    /// Creates the vector extension, the card table and its index if missing.
    pub async fn initialize(&self) -> Result<()> {
        for stmt in schema::create_statements(self.embedding_dim) {
            self.client.batch_execute(&stmt).await?;
        }
        info!(table = schema::TABLE_EVIDENCE_CARDS, dim = self.embedding_dim, "Schema ready");
        Ok(())
    }

    pub async fn stats(&self) -> Result<DatabaseStats> {
        let row = self.client
            .query_one(
                &format!(
                    "SELECT COUNT(*), COUNT(DISTINCT category_id) FROM {}",
                    schema::TABLE_EVIDENCE_CARDS
                ),
                &[],
            )
            .await?;
        let cards: i64 = row.get(0);
        let categories: i64 = row.get(1);
        Ok(DatabaseStats {
            cards: cards.max(0) as u64,
            categories: categories.max(0) as u64,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatabaseStats {
    pub cards: u64,
    pub categories: u64,
}
