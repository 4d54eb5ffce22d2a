//! Read-only collaborators owned by other services.
//!
//! - `IdentityDirectory`: resolves user ids to public profiles
//! - `JobDirectory`: resolves job references to a summary for enrichment
//!
//! Both have an in-memory adapter (optionally seeded from JSON) and a
//! PostgreSQL adapter reading the `users` / `jobs` tables.

mod memory;
mod postgres;
mod types;

use async_trait::async_trait;

use crate::storage::StoreError;

pub use memory::{DirectorySeed, MemoryDirectory};
pub use postgres::PostgresDirectory;
pub use types::{JobSummary, UserProfile};

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Display name used in notification text, falling back to the raw id.
    async fn display_name(&self, user_id: &str) -> Result<String, StoreError> {
        Ok(self
            .find_user(user_id)
            .await?
            .map(|profile| profile.full_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| user_id.to_string()))
    }
}

#[async_trait]
pub trait JobDirectory: Send + Sync {
    async fn find_job(&self, job_id: &str) -> Result<Option<JobSummary>, StoreError>;
}
