//! PostgreSQL-based conversation store.
//!
//! Table structure (see `migrations/`):
//! - `conversations` - one row per dedup key, unique on
//!   `(participant_low, participant_high, job_key)`
//! - `messages` - append-only log, ordered by `(created_at, seq)`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage::StoreError;

use super::store::ConversationStore;
use super::{Conversation, DedupKey, Message, MessageDraft, ParticipantPair};

const CONVERSATION_COLUMNS: &str = "id, participant_low, participant_high, job_id, \
     last_message_id, unread_count, created_at, updated_at";

const MESSAGE_COLUMNS: &str =
    "id, conversation_id, sender_id, receiver_id, content, job_id, is_read, created_at";

#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: Uuid,
    participant_low: String,
    participant_high: String,
    job_id: Option<String>,
    last_message_id: Option<Uuid>,
    unread_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ConversationRow> for Conversation {
    type Error = StoreError;

    fn try_from(row: ConversationRow) -> Result<Self, Self::Error> {
        let participants = ParticipantPair::new(row.participant_low, row.participant_high)
            .map_err(|e| StoreError::Corrupt(format!("conversation {}: {}", row.id, e)))?;

        Ok(Conversation {
            id: row.id,
            participants,
            related_job_id: row.job_id,
            last_message_id: row.last_message_id,
            unread_count: row.unread_count.max(0) as u32,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    conversation_id: Uuid,
    sender_id: String,
    receiver_id: String,
    content: String,
    job_id: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Message {
            id: row.id,
            conversation_id: row.conversation_id,
            sender_id: row.sender_id,
            receiver_id: row.receiver_id,
            content: row.content,
            related_job_id: row.job_id,
            read: row.is_read,
            created_at: row.created_at,
        }
    }
}

pub struct PostgresConversationStore {
    pool: PgPool,
}

impl PostgresConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationStore for PostgresConversationStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<Conversation>, StoreError> {
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE participant_low = $1 AND participant_high = $2 AND job_key = $3"
        ))
        .bind(key.pair.low())
        .bind(key.pair.high())
        .bind(key.job_key())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Conversation::try_from).transpose()
    }

    async fn insert(&self, key: &DedupKey) -> Result<Conversation, StoreError> {
        let conversation = Conversation::new(key);

        // The unique index decides the race; the loser gets no row back
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "INSERT INTO conversations \
                 (id, participant_low, participant_high, job_id, job_key, unread_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, 0, $6, $6) \
             ON CONFLICT (participant_low, participant_high, job_key) DO NOTHING \
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(conversation.id)
        .bind(key.pair.low())
        .bind(key.pair.high())
        .bind(key.job_id.as_deref())
        .bind(key.job_key())
        .bind(conversation.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Conversation::try_from(row),
            None => Err(StoreError::Conflict(format!(
                "conversation ({}, {}, '{}')",
                key.pair.low(),
                key.pair.high(),
                key.job_key()
            ))),
        }
    }

    async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, StoreError> {
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1"
        ))
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Conversation::try_from).transpose()
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let rows: Vec<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             WHERE participant_low = $1 OR participant_high = $1 \
             ORDER BY updated_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Conversation::try_from).collect()
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> Result<(Message, Conversation), StoreError> {
        let message_id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        // Row lock on the conversation serializes concurrent sends
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "UPDATE conversations \
             SET last_message_id = $2, unread_count = unread_count + 1, updated_at = clock_timestamp() \
             WHERE id = $1 \
             RETURNING {CONVERSATION_COLUMNS}"
        ))
        .bind(conversation_id)
        .bind(message_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(StoreError::MissingConversation(conversation_id));
        };
        let conversation = Conversation::try_from(row)?;

        let message: MessageRow = sqlx::query_as(&format!(
            "INSERT INTO messages \
                 (id, conversation_id, sender_id, receiver_id, content, job_id, is_read, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message_id)
        .bind(conversation_id)
        .bind(&draft.sender_id)
        .bind(&draft.receiver_id)
        .bind(&draft.content)
        .bind(draft.related_job_id.as_deref())
        .bind(conversation.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((Message::from(message), conversation))
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Message::from).collect())
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Message::from))
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        viewer_id: &str,
    ) -> Result<(Conversation, Vec<Message>), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Row lock serializes the snapshot and reset against concurrent sends
        let row: Option<ConversationRow> = sqlx::query_as(&format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = $1 FOR UPDATE"
        ))
        .bind(conversation_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(StoreError::MissingConversation(conversation_id));
        };

        let messages: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = $1 \
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(conversation_id)
        .fetch_all(&mut *tx)
        .await?;

        let flipped = sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE conversation_id = $1 AND sender_id <> $2 AND is_read = FALSE
            "#,
        )
        .bind(conversation_id)
        .bind(viewer_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query("UPDATE conversations SET unread_count = 0 WHERE id = $1")
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::trace!(
            conversation_id = %conversation_id,
            viewer_id = %viewer_id,
            flipped = flipped,
            "Marked conversation read"
        );

        Ok((
            Conversation::try_from(row)?,
            messages.into_iter().map(Message::from).collect(),
        ))
    }
}
