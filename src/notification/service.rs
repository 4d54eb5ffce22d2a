use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppError;

use super::resolver::RelatedEntityResolver;
use super::store::NotificationStore;
use super::{Notification, NotificationView};

/// Recipient-facing notification operations
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    resolver: RelatedEntityResolver,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, resolver: RelatedEntityResolver) -> Self {
        Self { store, resolver }
    }

    /// Notifications of `caller`, newest first, with related entities resolved
    #[tracing::instrument(name = "notification.list", skip(self))]
    pub async fn list(&self, caller: &str) -> Result<Vec<NotificationView>, AppError> {
        let notifications = self.store.list_for_recipient(caller).await?;
        let mut views = Vec::with_capacity(notifications.len());

        for notification in notifications {
            let related_details = self.resolver.resolve(&notification).await;
            views.push(NotificationView {
                notification,
                related_details,
            });
        }

        Ok(views)
    }

    #[tracing::instrument(name = "notification.mark_read", skip(self), fields(notification_id = %notification_id))]
    pub async fn mark_read(&self, caller: &str, notification_id: Uuid) -> Result<Notification, AppError> {
        self.load_for_recipient(caller, notification_id).await?;

        self.store
            .mark_read(notification_id)
            .await?
            .ok_or_else(not_found)
    }

    /// Returns the number of notifications that changed
    #[tracing::instrument(name = "notification.mark_all_read", skip(self))]
    pub async fn mark_all_read(&self, caller: &str) -> Result<u64, AppError> {
        let updated = self.store.mark_all_read(caller).await?;
        tracing::debug!(updated = updated, "Marked all notifications read");
        Ok(updated)
    }

    #[tracing::instrument(name = "notification.delete", skip(self), fields(notification_id = %notification_id))]
    pub async fn delete(&self, caller: &str, notification_id: Uuid) -> Result<(), AppError> {
        self.load_for_recipient(caller, notification_id).await?;

        if self.store.delete(notification_id).await? {
            Ok(())
        } else {
            Err(not_found())
        }
    }

    async fn load_for_recipient(
        &self,
        caller: &str,
        notification_id: Uuid,
    ) -> Result<Notification, AppError> {
        let notification = self
            .store
            .get(notification_id)
            .await?
            .ok_or_else(not_found)?;

        if notification.recipient_id != caller {
            return Err(AppError::Forbidden(
                "Not the recipient of this notification".to_string(),
            ));
        }

        Ok(notification)
    }
}

fn not_found() -> AppError {
    AppError::NotFound("Notification not found".to_string())
}
