//! In-memory conversation store using DashMap.
//!
//! A conversation and its message log share one map entry, so holding the
//! entry guard serializes every mutation of that conversation.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::storage::StoreError;

use super::store::ConversationStore;
use super::{Conversation, DedupKey, Message, MessageDraft};

struct ConversationEntry {
    conversation: Conversation,
    messages: Vec<Message>,
}

#[derive(Default)]
pub struct MemoryConversationStore {
    /// conversation_id -> conversation + message log
    conversations: DashMap<Uuid, ConversationEntry>,
    /// dedup key -> conversation_id (the uniqueness constraint)
    dedup_index: DashMap<DedupKey, Uuid>,
    /// user_id -> conversation ids
    user_index: DashMap<String, HashSet<Uuid>>,
    /// message_id -> conversation_id
    message_index: DashMap<Uuid, Uuid>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored conversations
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<Conversation>, StoreError> {
        let Some(id) = self.dedup_index.get(key).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.conversations.get(&id).map(|e| e.conversation.clone()))
    }

    async fn insert(&self, key: &DedupKey) -> Result<Conversation, StoreError> {
        match self.dedup_index.entry(key.clone()) {
            Entry::Occupied(existing) => Err(StoreError::Conflict(format!(
                "conversation {} already exists for this participant pair",
                existing.get()
            ))),
            Entry::Vacant(slot) => {
                let conversation = Conversation::new(key);
                let id = conversation.id;

                // Make the row visible before publishing it through the index
                self.conversations.insert(
                    id,
                    ConversationEntry {
                        conversation: conversation.clone(),
                        messages: Vec::new(),
                    },
                );
                for user_id in key.pair.iter() {
                    self.user_index
                        .entry(user_id.to_string())
                        .or_default()
                        .insert(id);
                }
                slot.insert(id);

                tracing::debug!(conversation_id = %id, "Conversation created");
                Ok(conversation)
            }
        }
    }

    async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, StoreError> {
        Ok(self
            .conversations
            .get(&conversation_id)
            .map(|e| e.conversation.clone()))
    }

    async fn list_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, StoreError> {
        let ids: Vec<Uuid> = self
            .user_index
            .get(user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();

        let mut conversations: Vec<Conversation> = ids
            .iter()
            .filter_map(|id| self.conversations.get(id).map(|e| e.conversation.clone()))
            .collect();
        conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        Ok(conversations)
    }

    async fn append_message(
        &self,
        conversation_id: Uuid,
        draft: MessageDraft,
    ) -> Result<(Message, Conversation), StoreError> {
        let mut entry = self
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::MissingConversation(conversation_id))?;

        // Keep creation order monotonic within the log
        let mut created_at = Utc::now();
        if let Some(last) = entry.messages.last() {
            if created_at < last.created_at {
                created_at = last.created_at;
            }
        }

        let message = Message::from_draft(conversation_id, draft, created_at);
        entry.messages.push(message.clone());
        entry.conversation.record_message(&message);
        let conversation = entry.conversation.clone();
        drop(entry);

        self.message_index.insert(message.id, conversation_id);

        Ok((message, conversation))
    }

    async fn messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, StoreError> {
        Ok(self
            .conversations
            .get(&conversation_id)
            .map(|e| e.messages.clone())
            .unwrap_or_default())
    }

    async fn get_message(&self, message_id: Uuid) -> Result<Option<Message>, StoreError> {
        let Some(conversation_id) = self.message_index.get(&message_id).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.conversations.get(&conversation_id).and_then(|e| {
            e.messages.iter().find(|m| m.id == message_id).cloned()
        }))
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        viewer_id: &str,
    ) -> Result<(Conversation, Vec<Message>), StoreError> {
        let mut entry = self
            .conversations
            .get_mut(&conversation_id)
            .ok_or(StoreError::MissingConversation(conversation_id))?;

        let entry = &mut *entry;
        let snapshot = (entry.conversation.clone(), entry.messages.clone());

        for message in entry.messages.iter_mut() {
            if message.sender_id != viewer_id && !message.read {
                message.read = true;
            }
        }
        entry.conversation.unread_count = 0;

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ParticipantPair;

    fn key(a: &str, b: &str, job: Option<&str>) -> DedupKey {
        DedupKey::new(
            ParticipantPair::new(a, b).unwrap(),
            job.map(str::to_string),
        )
    }

    fn draft(from: &str, to: &str, content: &str) -> MessageDraft {
        MessageDraft {
            sender_id: from.to_string(),
            receiver_id: to.to_string(),
            content: content.to_string(),
            related_job_id: None,
        }
    }

    #[tokio::test]
    async fn test_insert_conflicts_on_same_key() {
        let store = MemoryConversationStore::new();
        let first = store.insert(&key("a", "b", None)).await.unwrap();

        let second = store.insert(&key("b", "a", None)).await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));

        let found = store.find_by_key(&key("b", "a", None)).await.unwrap().unwrap();
        assert_eq!(found.id, first.id);
        assert_eq!(store.conversation_count(), 1);
    }

    #[tokio::test]
    async fn test_job_reference_separates_conversations() {
        let store = MemoryConversationStore::new();
        let general = store.insert(&key("a", "b", None)).await.unwrap();
        let scoped = store.insert(&key("a", "b", Some("job-1"))).await.unwrap();

        assert_ne!(general.id, scoped.id);
        assert_eq!(scoped.related_job_id.as_deref(), Some("job-1"));
    }

    #[tokio::test]
    async fn test_append_updates_aggregate() {
        let store = MemoryConversationStore::new();
        let conversation = store.insert(&key("a", "b", None)).await.unwrap();

        let (first, _) = store
            .append_message(conversation.id, draft("a", "b", "one"))
            .await
            .unwrap();
        let (second, updated) = store
            .append_message(conversation.id, draft("b", "a", "two"))
            .await
            .unwrap();

        assert_eq!(updated.last_message_id, Some(second.id));
        assert_eq!(updated.unread_count, 2);

        let messages = store.messages(conversation.id).await.unwrap();
        assert_eq!(messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![first.id, second.id]);
        assert!(messages[0].created_at <= messages[1].created_at);
    }

    #[tokio::test]
    async fn test_append_to_missing_conversation() {
        let store = MemoryConversationStore::new();
        let result = store.append_message(Uuid::new_v4(), draft("a", "b", "x")).await;
        assert!(matches!(result, Err(StoreError::MissingConversation(_))));
    }

    #[tokio::test]
    async fn test_mark_read_only_flips_other_senders() {
        let store = MemoryConversationStore::new();
        let conversation = store.insert(&key("a", "b", None)).await.unwrap();
        store.append_message(conversation.id, draft("a", "b", "from a")).await.unwrap();
        store.append_message(conversation.id, draft("b", "a", "from b")).await.unwrap();

        let (before, seen) = store.mark_read(conversation.id, "b").await.unwrap();

        // Returned rows are the state the viewer opened
        assert_eq!(before.unread_count, 2);
        assert!(seen.iter().all(|m| !m.read));

        let after = store.get(conversation.id).await.unwrap().unwrap();
        assert_eq!(after.unread_count, 0);
        let messages = store.messages(conversation.id).await.unwrap();
        let from_a = messages.iter().find(|m| m.sender_id == "a").unwrap();
        let from_b = messages.iter().find(|m| m.sender_id == "b").unwrap();
        assert!(from_a.read);
        assert!(!from_b.read);
    }

    #[tokio::test]
    async fn test_list_sorted_by_update() {
        let store = MemoryConversationStore::new();
        let older = store.insert(&key("a", "b", None)).await.unwrap();
        let newer = store.insert(&key("a", "c", None)).await.unwrap();
        store.append_message(older.id, draft("a", "b", "bump")).await.unwrap();

        let listed = store.list_for_user("a").await.unwrap();
        assert_eq!(listed.iter().map(|c| c.id).collect::<Vec<_>>(), vec![older.id, newer.id]);

        assert_eq!(store.list_for_user("b").await.unwrap().len(), 1);
        assert!(store.list_for_user("z").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_message() {
        let store = MemoryConversationStore::new();
        let conversation = store.insert(&key("a", "b", None)).await.unwrap();
        let (message, _) = store
            .append_message(conversation.id, draft("a", "b", "hello"))
            .await
            .unwrap();

        let found = store.get_message(message.id).await.unwrap().unwrap();
        assert_eq!(found.content, "hello");
        assert!(store.get_message(Uuid::new_v4()).await.unwrap().is_none());
    }
}
