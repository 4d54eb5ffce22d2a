//! PostgreSQL directory reading the externally-owned `users` and `jobs` tables.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::storage::StoreError;

use super::{IdentityDirectory, JobDirectory, JobSummary, UserProfile};

pub struct PostgresDirectory {
    pool: PgPool,
}

impl PostgresDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityDirectory for PostgresDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            r#"
            SELECT id, full_name, avatar, email, phone
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }
}

#[async_trait]
impl JobDirectory for PostgresDirectory {
    async fn find_job(&self, job_id: &str) -> Result<Option<JobSummary>, StoreError> {
        let job = sqlx::query_as::<_, JobSummary>(
            r#"
            SELECT id, title, company, location, status
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }
}
