//! Error types for the database layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("database connection error: {0}")]
    ConnectionError(String),

    #[error("database migration error: {0}")]
    MigrationError(String),

    #[error("duplicate entity: {0}")]
    Duplicate(String),

    #[error("invalid stored data: {0}")]
    InvalidData(String),

    #[error("database query error: {0}")]
    Query(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Maps unique-constraint violations to [`DatabaseError::Duplicate`].
    pub fn from_insert(error: sqlx::Error, entity: &str) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Duplicate(entity.to_string())
            }
            _ => Self::Query(error),
        }
    }
}
