use axum::{
    routing::{get, put},
    Router,
};

use crate::server::AppState;

use super::conversations::{get_conversation, list_conversations, send_message, start_conversation};
use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::notifications::{
    delete_notification, list_notifications, mark_all_read, mark_notification_read,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        // Caller-scoped endpoints; every handler requires a bearer token
        .nest(
            "/api/v1",
            Router::new()
                // Conversations
                .route("/conversations", get(list_conversations).post(start_conversation))
                .route("/conversations/{id}", get(get_conversation).post(send_message))
                // Notifications
                .route("/notifications", get(list_notifications))
                .route("/notifications/mark-all-read", put(mark_all_read))
                .route(
                    "/notifications/{id}",
                    put(mark_notification_read).delete(delete_notification),
                ),
        )
}
