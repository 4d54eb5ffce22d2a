//! API layer - HTTP endpoint handlers organized by domain.

mod conversations;
mod extract;
mod health;
mod metrics;
mod notifications;
mod routes;

pub use extract::ApiJson;
pub use conversations::{get_conversation, list_conversations, send_message, start_conversation};
pub use health::{health, stats};
pub use metrics::prometheus_metrics;
pub use notifications::{delete_notification, list_notifications, mark_all_read, mark_notification_read};
pub use routes::api_routes;
