use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::cluster::{ClusterRouter, RouteResult};
use crate::conversation::Message;
use crate::metrics::NotificationMetrics;
use crate::storage::StoreError;
use crate::websocket::ServerMessage;

use super::store::NotificationStore;
use super::{Notification, NotificationDraft, NotificationKind, RelatedEntity};

/// Placeholder replaced with the sender's display name
pub const SENDER_PLACEHOLDER: &str = "{sender}";

/// Statistics for the notification fanout
#[derive(Debug, Default)]
pub struct FanoutStats {
    /// Notifications persisted
    pub total_created: AtomicU64,
    /// Pushes that reached at least one live session
    pub pushes_delivered: AtomicU64,
    /// Pushes to recipients with no live session on this node
    pub pushes_offline: AtomicU64,
    /// Pushes dropped by full or closed session buffers
    pub pushes_dropped: AtomicU64,
}

impl FanoutStats {
    pub fn snapshot(&self) -> FanoutStatsSnapshot {
        FanoutStatsSnapshot {
            total_created: self.total_created.load(Ordering::Relaxed),
            pushes_delivered: self.pushes_delivered.load(Ordering::Relaxed),
            pushes_offline: self.pushes_offline.load(Ordering::Relaxed),
            pushes_dropped: self.pushes_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of fanout statistics
#[derive(Debug, Clone, Serialize)]
pub struct FanoutStatsSnapshot {
    pub total_created: u64,
    pub pushes_delivered: u64,
    pub pushes_offline: u64,
    pub pushes_dropped: u64,
}

/// Turns domain events into persisted notifications and pushes them to the
/// recipient's room. The persisted record is the durable channel; the push
/// is best effort.
pub struct NotificationFanout {
    store: Arc<dyn NotificationStore>,
    router: Arc<ClusterRouter>,
    template: String,
    stats: FanoutStats,
}

impl NotificationFanout {
    pub fn new(store: Arc<dyn NotificationStore>, router: Arc<ClusterRouter>, template: impl Into<String>) -> Self {
        Self {
            store,
            router,
            template: template.into(),
            stats: FanoutStats::default(),
        }
    }

    pub fn stats(&self) -> FanoutStatsSnapshot {
        self.stats.snapshot()
    }

    /// Notify `recipient_id` that `message` arrived from `sender_name`.
    #[tracing::instrument(
        name = "fanout.message_received",
        skip(self, message),
        fields(message_id = %message.id)
    )]
    pub async fn message_received(
        &self,
        recipient_id: &str,
        sender_name: &str,
        message: &Message,
    ) -> Result<Notification, StoreError> {
        let draft = NotificationDraft {
            recipient_id: recipient_id.to_string(),
            kind: NotificationKind::Message,
            text: self.render(sender_name),
            related: Some(RelatedEntity::Message(message.id)),
        };

        self.create(draft).await
    }

    /// Persist a notification, then push it to the recipient's room
    pub async fn create(&self, draft: NotificationDraft) -> Result<Notification, StoreError> {
        let notification = self.store.insert(draft).await?;

        self.stats.total_created.fetch_add(1, Ordering::Relaxed);
        NotificationMetrics::record_created(notification.kind.as_str());
        tracing::debug!(
            notification_id = %notification.id,
            recipient_id = %notification.recipient_id,
            "Notification created"
        );

        self.push(&notification).await;
        Ok(notification)
    }

    /// Best-effort live push; never fails the caller
    pub async fn push(&self, notification: &Notification) -> Option<RouteResult> {
        let payload = match serde_json::to_value(notification) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(
                    notification_id = %notification.id,
                    error = %e,
                    "Failed to serialize notification for push"
                );
                return None;
            }
        };

        let result = self
            .router
            .route_to_user(&notification.recipient_id, ServerMessage::NewNotification(payload))
            .await;

        if result.local_delivered > 0 {
            self.stats.pushes_delivered.fetch_add(1, Ordering::Relaxed);
            NotificationMetrics::record_push_delivered();
        } else if result.dropped > 0 {
            self.stats.pushes_dropped.fetch_add(1, Ordering::Relaxed);
            NotificationMetrics::record_push_dropped();
        } else {
            self.stats.pushes_offline.fetch_add(1, Ordering::Relaxed);
            NotificationMetrics::record_push_offline();
        }

        Some(result)
    }

    fn render(&self, sender_name: &str) -> String {
        self.template.replace(SENDER_PLACEHOLDER, sender_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection_manager::ConnectionManager;
    use crate::conversation::MessageDraft;
    use crate::notification::MemoryNotificationStore;
    use chrono::Utc;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    fn message(to: &str) -> Message {
        Message::from_draft(
            Uuid::new_v4(),
            MessageDraft {
                sender_id: "u1".into(),
                receiver_id: to.into(),
                content: "hi".into(),
                related_job_id: None,
            },
            Utc::now(),
        )
    }

    fn fanout(manager: Arc<ConnectionManager>) -> (NotificationFanout, Arc<MemoryNotificationStore>) {
        let store = Arc::new(MemoryNotificationStore::new());
        let router = Arc::new(ClusterRouter::local(manager));
        let fanout = NotificationFanout::new(
            store.clone(),
            router,
            "You have a new message from {sender}",
        );
        (fanout, store)
    }

    #[tokio::test]
    async fn test_persists_without_live_session() {
        let (fanout, store) = fanout(Arc::new(ConnectionManager::new()));
        let message = message("u2");

        let notification = fanout.message_received("u2", "Alice", &message).await.unwrap();

        assert_eq!(notification.message, "You have a new message from Alice");
        assert_eq!(notification.kind, NotificationKind::Message);
        assert_eq!(notification.related_entity, Some(RelatedEntity::Message(message.id)));
        assert!(!notification.read);
        assert_eq!(store.list_for_recipient("u2").await.unwrap().len(), 1);
        assert_eq!(fanout.stats().pushes_offline, 1);
    }

    #[tokio::test]
    async fn test_pushes_to_joined_session() {
        let manager = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::channel(4);
        let session = manager.register(Some("u2".into()), tx);
        assert!(manager.join(session.id, "u2"));

        let (fanout, _) = fanout(manager);
        let notification = fanout
            .message_received("u2", "Alice", &message("u2"))
            .await
            .unwrap();

        match rx.recv().await {
            Some(ServerMessage::NewNotification(payload)) => {
                assert_eq!(payload["id"], notification.id.to_string());
                assert_eq!(payload["type"], "message");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
        assert_eq!(fanout.stats().pushes_delivered, 1);
    }
}
