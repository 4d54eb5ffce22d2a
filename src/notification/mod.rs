//! Notifications: persisted alerts, fanout on new messages, and the
//! recipient-facing service.
//!
//! # Store Architecture
//!
//! - `MemoryNotificationStore`: In-memory storage using DashMap (default)
//! - `PostgresNotificationStore`: Persistent storage in the `notifications` table
//!
//! Use `storage::create_backends()` to build the store selected by configuration.

mod fanout;
mod memory_store;
mod postgres_store;
mod resolver;
mod service;
mod store;
mod types;

pub use fanout::{FanoutStats, FanoutStatsSnapshot, NotificationFanout, SENDER_PLACEHOLDER};
pub use memory_store::MemoryNotificationStore;
pub use postgres_store::PostgresNotificationStore;
pub use resolver::{EntityLookup, JobLookup, MessageLookup, RelatedEntityResolver};
pub use service::NotificationService;
pub use store::NotificationStore;
pub use types::{
    EntityKind, Notification, NotificationDraft, NotificationKind, NotificationView, ParseTagError,
    RelatedEntity,
};
