use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::directory::{JobSummary, UserProfile};

/// The two members of a conversation, stored in sorted order so that
/// `{a, b}` and `{b, a}` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ParticipantPair(String, String);

/// Error returned when a pair cannot be formed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairError {
    #[error("participant identity is empty")]
    Empty,
    #[error("a conversation needs two distinct participants")]
    SameParticipant,
}

impl ParticipantPair {
    pub fn new(a: impl Into<String>, b: impl Into<String>) -> Result<Self, PairError> {
        let (a, b) = (a.into(), b.into());
        if a.is_empty() || b.is_empty() {
            return Err(PairError::Empty);
        }
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Ok(Self(a, b)),
            std::cmp::Ordering::Greater => Ok(Self(b, a)),
            std::cmp::Ordering::Equal => Err(PairError::SameParticipant),
        }
    }

    pub fn low(&self) -> &str {
        &self.0
    }

    pub fn high(&self) -> &str {
        &self.1
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.0 == user_id || self.1 == user_id
    }

    /// The other participant, or `None` if `user_id` is not a member
    pub fn counterpart(&self, user_id: &str) -> Option<&str> {
        if self.0 == user_id {
            Some(&self.1)
        } else if self.1 == user_id {
            Some(&self.0)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [self.0.as_str(), self.1.as_str()].into_iter()
    }
}

/// Decides whether an existing conversation is reused:
/// (unordered participant pair, job reference or absent).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub pair: ParticipantPair,
    pub job_id: Option<String>,
}

impl DedupKey {
    /// Empty job references collapse to "absent" so both spellings share a key.
    pub fn new(pair: ParticipantPair, job_id: Option<String>) -> Self {
        Self {
            pair,
            job_id: normalize_job_id(job_id),
        }
    }

    /// Column value backing the storage-level unique index
    pub fn job_key(&self) -> &str {
        self.job_id.as_deref().unwrap_or("")
    }
}

pub fn normalize_job_id(job_id: Option<String>) -> Option<String> {
    job_id
        .map(|j| j.trim().to_string())
        .filter(|j| !j.is_empty())
}

/// Durable two-party conversation with its aggregate state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: Uuid,
    pub participants: ParticipantPair,
    pub related_job_id: Option<String>,
    pub last_message_id: Option<Uuid>,
    /// Conversation-scoped counter shared by both participants
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(key: &DedupKey) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            participants: key.pair.clone(),
            related_job_id: key.job_id.clone(),
            last_message_id: None,
            unread_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participants.contains(user_id)
    }

    /// Apply the aggregate update that accompanies every appended message
    pub fn record_message(&mut self, message: &Message) {
        self.last_message_id = Some(message.id);
        self.unread_count = self.unread_count.saturating_add(1);
        self.updated_at = message.created_at;
    }
}

/// Input for appending a message; ids and timestamps are assigned by the store
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub related_job_id: Option<String>,
}

/// Immutable message; only `read` changes after creation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: String,
    pub receiver_id: String,
    pub content: String,
    pub related_job_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn from_draft(conversation_id: Uuid, draft: MessageDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id,
            sender_id: draft.sender_id,
            receiver_id: draft.receiver_id,
            content: draft.content,
            related_job_id: draft.related_job_id,
            read: false,
            created_at,
        }
    }
}

/// Last-message fields shown in the conversation list
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePreview {
    pub id: Uuid,
    pub sender_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Message> for MessagePreview {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// A conversation as listed for one caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: Uuid,
    pub counterpart_id: String,
    pub counterpart: Option<UserProfile>,
    pub related_job: Option<JobSummary>,
    pub last_message: Option<MessagePreview>,
    pub unread_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Conversation with both participants' profiles resolved
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationView {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub participant_profiles: Vec<UserProfile>,
    pub related_job: Option<JobSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDetail {
    pub conversation: ConversationView,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartedConversation {
    pub conversation: Conversation,
    pub message: Message,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_is_unordered() {
        let ab = ParticipantPair::new("alice", "bob").unwrap();
        let ba = ParticipantPair::new("bob", "alice").unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.low(), "alice");
        assert_eq!(ab.high(), "bob");
    }

    #[test]
    fn test_pair_rejects_duplicates_and_empty() {
        assert_eq!(
            ParticipantPair::new("alice", "alice"),
            Err(PairError::SameParticipant)
        );
        assert_eq!(ParticipantPair::new("", "bob"), Err(PairError::Empty));
    }

    #[test]
    fn test_counterpart() {
        let pair = ParticipantPair::new("alice", "bob").unwrap();
        assert_eq!(pair.counterpart("alice"), Some("bob"));
        assert_eq!(pair.counterpart("bob"), Some("alice"));
        assert_eq!(pair.counterpart("carol"), None);
    }

    #[test]
    fn test_absent_and_empty_job_share_key() {
        let pair = ParticipantPair::new("alice", "bob").unwrap();
        let absent = DedupKey::new(pair.clone(), None);
        let empty = DedupKey::new(pair.clone(), Some("  ".to_string()));
        let job = DedupKey::new(pair, Some("job-1".to_string()));

        assert_eq!(absent, empty);
        assert_eq!(absent.job_key(), "");
        assert_ne!(absent, job);
        assert_eq!(job.job_key(), "job-1");
    }

    #[test]
    fn test_record_message_updates_aggregate() {
        let key = DedupKey::new(ParticipantPair::new("alice", "bob").unwrap(), None);
        let mut conversation = Conversation::new(&key);
        let message = Message::from_draft(
            conversation.id,
            MessageDraft {
                sender_id: "alice".into(),
                receiver_id: "bob".into(),
                content: "hi".into(),
                related_job_id: None,
            },
            Utc::now(),
        );

        conversation.record_message(&message);

        assert_eq!(conversation.last_message_id, Some(message.id));
        assert_eq!(conversation.unread_count, 1);
        assert!(!message.read);
    }

    #[test]
    fn test_conversation_serializes_participants_as_array() {
        let key = DedupKey::new(ParticipantPair::new("u2", "u1").unwrap(), None);
        let conversation = Conversation::new(&key);
        let json = serde_json::to_value(&conversation).unwrap();

        assert_eq!(json["participants"], serde_json::json!(["u1", "u2"]));
        assert_eq!(json["unreadCount"], 0);
        assert!(json["relatedJobId"].is_null());
    }
}
