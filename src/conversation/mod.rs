//! Conversations between two users and their append-only message logs.
//!
//! # Store Architecture
//!
//! - `MemoryConversationStore`: DashMap-backed, the default
//! - `PostgresConversationStore`: durable, uniqueness enforced by an index
//!
//! [`ConversationService`] sits on top of a store and implements the
//! list / detail / start / send use-cases.

mod memory_store;
mod postgres_store;
mod service;
mod store;
mod types;

pub use memory_store::MemoryConversationStore;
pub use postgres_store::PostgresConversationStore;
pub use service::{ConversationService, SendMessageRequest, StartConversationRequest};
pub use store::ConversationStore;
pub use types::{
    normalize_job_id, Conversation, ConversationDetail, ConversationSummary, ConversationView,
    DedupKey, Message, MessageDraft, MessagePreview, PairError, ParticipantPair,
    StartedConversation,
};
