//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    CLUSTER_EVENTS_PUBLISHED, CLUSTER_EVENTS_RECEIVED, CLUSTER_PUBLISH_FAILURES,
    CONVERSATIONS_CREATED, DEDUP_CONFLICTS, HEARTBEAT_DURATION_MS, MESSAGES_APPENDED,
    NOTIFICATIONS_CREATED, REALTIME_PUSHES, STALE_SESSIONS_REMOVED, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording conversation metrics
pub struct ConversationMetrics;

impl ConversationMetrics {
    pub fn record_created() {
        CONVERSATIONS_CREATED.inc();
    }

    /// Record a losing concurrent insert
    pub fn record_conflict() {
        DEDUP_CONFLICTS.inc();
    }

    pub fn record_message_appended() {
        MESSAGES_APPENDED.inc();
    }
}

/// Helper struct for recording notification metrics
pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_created(kind: &str) {
        NOTIFICATIONS_CREATED.with_label_values(&[kind]).inc();
    }

    /// Record a push that reached at least one live session
    pub fn record_push_delivered() {
        REALTIME_PUSHES.with_label_values(&["delivered"]).inc();
    }

    /// Record a push to a recipient with no live session on this node
    pub fn record_push_offline() {
        REALTIME_PUSHES.with_label_values(&["offline"]).inc();
    }

    /// Record a push dropped because every session buffer was full or closed
    pub fn record_push_dropped() {
        REALTIME_PUSHES.with_label_values(&["dropped"]).inc();
    }
}

/// Helper struct for recording client frame metrics
pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_join() {
        WS_MESSAGES_RECEIVED.with_label_values(&["join"]).inc();
    }

    pub fn record_private_message() {
        WS_MESSAGES_RECEIVED.with_label_values(&["privateMessage"]).inc();
    }

    pub fn record_notification() {
        WS_MESSAGES_RECEIVED.with_label_values(&["notification"]).inc();
    }

    pub fn record_ping() {
        WS_MESSAGES_RECEIVED.with_label_values(&["ping"]).inc();
    }
}

/// Helper struct for recording heartbeat metrics
pub struct HeartbeatMetrics;

impl HeartbeatMetrics {
    pub fn record_duration_ms(duration_ms: u64) {
        HEARTBEAT_DURATION_MS.observe(duration_ms as f64);
    }

    pub fn record_stale_removed(count: u64) {
        STALE_SESSIONS_REMOVED.inc_by(count);
    }
}

/// Helper struct for recording cluster relay metrics
pub struct ClusterMetrics;

impl ClusterMetrics {
    pub fn record_published() {
        CLUSTER_EVENTS_PUBLISHED.inc();
    }

    pub fn record_received() {
        CLUSTER_EVENTS_RECEIVED.inc();
    }

    pub fn record_publish_failed() {
        CLUSTER_PUBLISH_FAILURES.inc();
    }
}
