//! Resolves a notification's related entity into display details.
//!
//! Lookups are registered per [`EntityKind`]; kinds without a registered
//! lookup resolve to `None`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::conversation::ConversationStore;
use crate::directory::JobDirectory;
use crate::storage::StoreError;

use super::{EntityKind, Notification, RelatedEntity};

#[async_trait]
pub trait EntityLookup: Send + Sync {
    /// Display details for `entity`, or `None` if it no longer exists
    async fn details(&self, entity: &RelatedEntity) -> Result<Option<Value>, StoreError>;
}

/// Job references: title, company and status
pub struct JobLookup {
    jobs: Arc<dyn JobDirectory>,
}

impl JobLookup {
    pub fn new(jobs: Arc<dyn JobDirectory>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl EntityLookup for JobLookup {
    async fn details(&self, entity: &RelatedEntity) -> Result<Option<Value>, StoreError> {
        let RelatedEntity::Job(job_id) = entity else {
            return Ok(None);
        };

        Ok(self.jobs.find_job(job_id).await?.map(|job| {
            json!({
                "title": job.title,
                "company": job.company,
                "status": job.status,
            })
        }))
    }
}

/// Message references: content
pub struct MessageLookup {
    store: Arc<dyn ConversationStore>,
}

impl MessageLookup {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EntityLookup for MessageLookup {
    async fn details(&self, entity: &RelatedEntity) -> Result<Option<Value>, StoreError> {
        let RelatedEntity::Message(message_id) = entity else {
            return Ok(None);
        };

        Ok(self
            .store
            .get_message(*message_id)
            .await?
            .map(|message| json!({ "content": message.content })))
    }
}

#[derive(Default)]
pub struct RelatedEntityResolver {
    lookups: HashMap<EntityKind, Arc<dyn EntityLookup>>,
}

impl RelatedEntityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver with job and message lookups registered
    pub fn with_defaults(jobs: Arc<dyn JobDirectory>, conversations: Arc<dyn ConversationStore>) -> Self {
        let mut resolver = Self::new();
        resolver.register(EntityKind::Job, Arc::new(JobLookup::new(jobs)));
        resolver.register(EntityKind::Message, Arc::new(MessageLookup::new(conversations)));
        resolver
    }

    pub fn register(&mut self, kind: EntityKind, lookup: Arc<dyn EntityLookup>) {
        self.lookups.insert(kind, lookup);
    }

    /// Lookup failures are logged and treated as unresolved
    pub async fn resolve(&self, notification: &Notification) -> Option<Value> {
        let entity = notification.related_entity.as_ref()?;
        let lookup = self.lookups.get(&entity.kind())?;

        match lookup.details(entity).await {
            Ok(details) => details,
            Err(e) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    entity_kind = %entity.kind().as_str(),
                    error = %e,
                    "Failed to resolve related entity"
                );
                None
            }
        }
    }
}
