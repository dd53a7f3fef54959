//! Database error types.

use thiserror::Error;
use tokio_postgres::error::SqlState;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Postgres error: {0}")]
    Postgres(#[source] tokio_postgres::Error),

    /// A row with this primary key already exists.
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    #[error("Invalid embedding dimension: expected {expected}, got {actual}")]
    InvalidEmbeddingDimension { expected: usize, actual: usize },
}

impl DbError {
    /// Maps unique-key violations (SQLSTATE 23505) to [`DbError::Duplicate`].
    pub fn from_postgres(err: tokio_postgres::Error, key: &str) -> Self {
        if err.code() == Some(&SqlState::UNIQUE_VIOLATION) {
            DbError::Duplicate(key.to_string())
        } else {
            DbError::Postgres(err)
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, DbError::Duplicate(_))
    }
}

impl From<tokio_postgres::Error> for DbError {
    fn from(err: tokio_postgres::Error) -> Self {
        DbError::Postgres(err)
    }
}
