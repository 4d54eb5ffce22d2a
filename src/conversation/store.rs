//! Backend trait for conversation and message storage.

use async_trait::async_trait;
use uuid::Uuid;

use crate::storage::StoreError;

use super::{Conversation, DedupKey, Message, MessageDraft};

/// Storage for conversations and their append-only message logs.
///
/// # Atomicity
///
/// - `insert` must enforce uniqueness of the [`DedupKey`] and report a losing
///   writer with `StoreError::Conflict`, never by creating a second row.
/// - `append_message` must persist the message and apply the aggregate update
///   (last-message pointer, unread counter) as one unit per conversation.
/// - `mark_read` must snapshot, flip read flags and reset the counter as one
///   unit.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Backend type identifier
    fn backend_name(&self) -> &'static str;

    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<Conversation>, StoreError>;

    /// Create an empty conversation for `key`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a conversation already exists for the key.
    async fn insert(&self, key: &DedupKey) -> Result<Conversation, StoreError>;

    async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, StoreError>;

    /// Conversations where `user_id` participates, most recently updated first
    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError>;

    /// Append a message and return it with the updated conversation.
    async fn append_message(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> Result<(Message, Conversation), StoreError>;

    /// Messages of a conversation ordered by creation time ascending
    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError>;

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Mark every message not sent by `viewer_id` as read and reset the unread
    /// counter. Returns the conversation and its ordered messages as they were
    /// immediately before the update.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        viewer_id: &str,
    ) -> Result<(Conversation, Vec<Message>), StoreError>;
}
