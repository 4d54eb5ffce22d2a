//! In-memory notification store using DashMap.

use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::storage::StoreError;

use super::store::NotificationStore;
use super::{Notification, NotificationDraft};

#[derive(Default)]
pub struct MemoryNotificationStore {
    /// notification_id -> notification
    notifications: DashMap<Uuid, Notification>,
    /// recipient_id -> notification ids
    recipient_index: DashMap<String, HashSet<Uuid>>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ids_for(&self, recipient_id: &str) -> Vec<Uuid> {
        self.recipient_index
            .get(recipient_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, draft: NotificationDraft) -> Result<Notification, StoreError> {
        let notification = Notification::from_draft(draft);

        self.notifications
            .insert(notification.id, notification.clone());
        self.recipient_index
            .entry(notification.recipient_id.clone())
            .or_default()
            .insert(notification.id);

        Ok(notification)
    }

    async fn get(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications.get(&notification_id).map(|n| n.clone()))
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError> {
        let mut notifications: Vec<Notification> = self
            .ids_for(recipient_id)
            .iter()
            .filter_map(|id| self.notifications.get(id).map(|n| n.clone()))
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(notifications)
    }

    async fn mark_read(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.notifications.get_mut(&notification_id).map(|mut n| {
            n.read = true;
            n.clone()
        }))
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, StoreError> {
        let mut updated = 0;
        for id in self.ids_for(recipient_id) {
            if let Some(mut notification) = self.notifications.get_mut(&id) {
                if !notification.read {
                    notification.read = true;
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }

    async fn delete(&self, notification_id: Uuid) -> Result<bool, StoreError> {
        let Some((_, notification)) = self.notifications.remove(&notification_id) else {
            return Ok(false);
        };

        if let Some(mut ids) = self.recipient_index.get_mut(&notification.recipient_id) {
            ids.remove(&notification_id);
            if ids.is_empty() {
                drop(ids);
                self.recipient_index
                    .remove_if(&notification.recipient_id, |_, ids| ids.is_empty());
            }
        }

        Ok(true)
    }
}
