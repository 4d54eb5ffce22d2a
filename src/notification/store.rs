//! Backend trait for notification storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::storage::StoreError;

use super::{Notification, NotificationDraft};

#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Backend type identifier
    fn backend_name(&self) -> &'static str;

    async fn insert(&self, draft: NotificationDraft) -> Result<Notification, StoreError>;

    async fn get(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError>;

    /// Notifications of a recipient, newest first
    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError>;

    /// Set `read = true`; returns the updated notification if it exists
    async fn mark_read(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError>;

    /// Flip every unread notification of the recipient; returns how many changed
    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, StoreError>;

    /// Returns `false` if nothing was deleted
    async fn delete(&self, notification_id: Uuid) -> Result<bool, StoreError>;
}
