//! PostgreSQL-based notification store.
//!
//! The polymorphic reference is stored as `(entity_kind, entity_id)`; both
//! are NULL when the notification has no related entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage::StoreError;

use super::store::NotificationStore;
use super::{Notification, NotificationDraft, NotificationKind, ParseTagError, RelatedEntity};

const NOTIFICATION_COLUMNS: &str =
    "id, recipient_id, kind, text, entity_kind, entity_id, is_read, created_at";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: String,
    kind: String,
    text: String,
    entity_kind: Option<String>,
    entity_id: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let corrupt =
            move |e: ParseTagError| StoreError::Corrupt(format!("notification {}: {}", id, e));

        let kind = row.kind.parse::<NotificationKind>().map_err(corrupt)?;
        let related_entity = match (row.entity_kind.as_deref(), row.entity_id.as_deref()) {
            (Some(kind), Some(id)) => Some(RelatedEntity::from_parts(kind, id).map_err(corrupt)?),
            _ => None,
        };

        Ok(Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            kind,
            message: row.text,
            related_entity,
            read: row.is_read,
            created_at: row.created_at,
        })
    }
}

pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, draft: NotificationDraft) -> Result<Notification, StoreError> {
        let notification = Notification::from_draft(draft);
        let entity_kind = notification.related_entity.as_ref().map(|e| e.kind().as_str());
        let entity_id = notification.related_entity.as_ref().map(|e| e.id_string());

        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, recipient_id, kind, text, entity_kind, entity_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
            "#,
        )
        .bind(notification.id)
        .bind(&notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(&notification.message)
        .bind(entity_kind)
        .bind(entity_id)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn get(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn list_for_recipient(&self, recipient_id: &str) -> Result<Vec<Notification>, StoreError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE recipient_id = $1 \
             ORDER BY created_at DESC"
        ))
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_read(&self, notification_id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 \
             RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Notification::try_from).transpose()
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete(&self, notification_id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(notification_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
