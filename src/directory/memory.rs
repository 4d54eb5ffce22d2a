//! In-memory directory, seeded from a JSON file or populated by tests.

use std::path::Path;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;

use crate::storage::StoreError;

use super::{IdentityDirectory, JobDirectory, JobSummary, UserProfile};

/// Shape of the seed file: `{"users": [...], "jobs": [...]}`
#[derive(Debug, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<UserProfile>,
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

#[derive(Default)]
pub struct MemoryDirectory {
    users: DashMap<String, UserProfile>,
    jobs: DashMap<String, JobSummary>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: DirectorySeed) -> Self {
        let directory = Self::new();
        for user in seed.users {
            directory.upsert_user(user);
        }
        for job in seed.jobs {
            directory.upsert_job(job);
        }
        directory
    }

    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;
        let seed: DirectorySeed = serde_json::from_str(&raw)
            .map_err(|e| StoreError::Seed(format!("{}: {}", path.display(), e)))?;

        tracing::info!(
            path = %path.display(),
            users = seed.users.len(),
            jobs = seed.jobs.len(),
            "Directory seeded"
        );

        Ok(Self::from_seed(seed))
    }

    pub fn upsert_user(&self, user: UserProfile) {
        self.users.insert(user.id.clone(), user);
    }

    pub fn upsert_job(&self, job: JobSummary) {
        self.jobs.insert(job.id.clone(), job);
    }
}

#[async_trait]
impl IdentityDirectory for MemoryDirectory {
    async fn find_user(&self, user_id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.users.get(user_id).map(|u| u.clone()))
    }
}

#[async_trait]
impl JobDirectory for MemoryDirectory {
    async fn find_job(&self, job_id: &str) -> Result<Option<JobSummary>, StoreError> {
        Ok(self.jobs.get(job_id).map(|j| j.clone()))
    }
}
