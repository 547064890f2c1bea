use thiserror::Error;

/// Errors returned by job and template repositories
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// No record exists for the requested key
    #[error("Not found: {0}")]
    NotFound(String),

    /// A record with the same key already exists
    #[error("Already exists: {0}")]
    Conflict(String),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Stored JSON could not be converted
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend is temporarily unavailable
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::NotFound(_))
    }
}
