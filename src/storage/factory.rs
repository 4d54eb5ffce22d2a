//! Storage backend factory

use std::sync::Arc;

use crate::config::Settings;
use crate::conversation::{ConversationStore, MemoryConversationStore, PostgresConversationStore};
use crate::directory::{
    IdentityDirectory, JobDirectory, MemoryDirectory, PostgresDirectory,
};
use crate::notification::{MemoryNotificationStore, NotificationStore, PostgresNotificationStore};
use crate::postgres::PostgresPool;

use super::StoreError;

/// The set of stores and collaborators the services are built from.
#[derive(Clone)]
pub struct Backends {
    pub conversations: Arc<dyn ConversationStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub identity: Arc<dyn IdentityDirectory>,
    pub jobs: Arc<dyn JobDirectory>,
}

impl Backends {
    /// In-memory stores sharing one directory for users and jobs.
    pub fn memory(directory: Arc<MemoryDirectory>) -> Self {
        Self {
            conversations: Arc::new(MemoryConversationStore::new()),
            notifications: Arc::new(MemoryNotificationStore::new()),
            identity: directory.clone(),
            jobs: directory,
        }
    }

    pub fn postgres(pool: &PostgresPool) -> Self {
        let directory = Arc::new(PostgresDirectory::new(pool.pool().clone()));
        Self {
            conversations: Arc::new(PostgresConversationStore::new(pool.pool().clone())),
            notifications: Arc::new(PostgresNotificationStore::new(pool.pool().clone())),
            identity: directory.clone(),
            jobs: directory,
        }
    }

    /// Backend type identifier
    pub fn name(&self) -> &'static str {
        self.conversations.backend_name()
    }
}

/// Create the storage backends selected by `storage.backend`.
///
/// - `"postgres"`: connects the pool (failing if the database is unreachable)
///   and applies migrations when `database.run_migrations` is set
/// - `"memory"` (default): DashMap stores; the directory is seeded from
///   `directory.seed_path` when configured
pub async fn create_backends(settings: &Settings) -> Result<Backends, StoreError> {
    if settings.uses_postgres() {
        let pool = PostgresPool::new(&settings.database).await?;
        tracing::info!(
            backend = "postgres",
            database = %pool.database_url_masked(),
            "Creating PostgreSQL storage backends"
        );

        if settings.database.run_migrations {
            pool.run_migrations().await?;
        }

        return Ok(Backends::postgres(&pool));
    }

    if settings.storage.backend != "memory" {
        tracing::warn!(
            backend = %settings.storage.backend,
            "Unknown storage backend, falling back to memory"
        );
    }

    let directory = match settings.directory.seed_path {
        Some(ref path) => MemoryDirectory::from_seed_file(path)?,
        None => MemoryDirectory::new(),
    };

    tracing::info!(backend = "memory", "Creating memory storage backends");
    Ok(Backends::memory(Arc::new(directory)))
}
