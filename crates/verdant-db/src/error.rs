//! Database error types

use thiserror::Error;

use verdant_types::MarketError;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),
}

impl From<DbError> for MarketError {
    fn from(e: DbError) -> Self {
        MarketError::Storage(e.to_string())
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
