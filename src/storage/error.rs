use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write; the caller should re-fetch
    #[error("Unique constraint conflict on {0}")]
    Conflict(String),

    /// The conversation a write targets does not exist
    #[error("Conversation {0} does not exist")]
    MissingConversation(Uuid),

    /// A persisted row could not be mapped back to a domain value
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Migration failed
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Seed or fixture file could not be read
    #[error("Seed error: {0}")]
    Seed(String),

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
