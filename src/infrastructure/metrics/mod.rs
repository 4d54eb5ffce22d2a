//! Prometheus metrics for the messaging service.
//!
//! - Realtime session metrics (sessions opened/closed, active rooms)
//! - Conversation metrics (created, dedup conflicts, messages appended)
//! - Notification metrics (created, live pushes by outcome)
//! - Cluster relay metrics

mod helpers;

pub use helpers::{
    encode_metrics, ClusterMetrics, ConversationMetrics, HeartbeatMetrics, NotificationMetrics,
    WsMessageMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "jobboard";

lazy_static! {
    // ============================================================================
    // Realtime Session Metrics
    // ============================================================================

    /// Number of live WebSocket sessions
    pub static ref SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_sessions_active", METRIC_PREFIX),
        "Number of live WebSocket sessions"
    ).unwrap();

    /// Number of rooms with at least one session
    pub static ref ROOMS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_rooms_active", METRIC_PREFIX),
        "Number of user rooms with at least one live session"
    ).unwrap();

    /// Total sessions opened
    pub static ref WS_SESSIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_sessions_opened_total", METRIC_PREFIX),
        "Total WebSocket sessions opened"
    ).unwrap();

    /// Total sessions closed
    pub static ref WS_SESSIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_sessions_closed_total", METRIC_PREFIX),
        "Total WebSocket sessions closed"
    ).unwrap();

    /// Session lifetime
    pub static ref WS_SESSION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_session_duration_seconds", METRIC_PREFIX),
        "WebSocket session duration in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();

    /// Client frames received by type
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total client frames received by type",
        &["type"]
    ).unwrap();

    /// Heartbeat round duration
    pub static ref HEARTBEAT_DURATION_MS: Histogram = register_histogram!(
        format!("{}_heartbeat_duration_ms", METRIC_PREFIX),
        "Heartbeat round duration in milliseconds",
        vec![1.0, 5.0, 10.0, 50.0, 100.0, 500.0, 1000.0]
    ).unwrap();

    /// Sessions removed for inactivity
    pub static ref STALE_SESSIONS_REMOVED: IntCounter = register_int_counter!(
        format!("{}_stale_sessions_removed_total", METRIC_PREFIX),
        "Total sessions removed for inactivity"
    ).unwrap();

    // ============================================================================
    // Conversation Metrics
    // ============================================================================

    /// Conversations created
    pub static ref CONVERSATIONS_CREATED: IntCounter = register_int_counter!(
        format!("{}_conversations_created_total", METRIC_PREFIX),
        "Total conversations created"
    ).unwrap();

    /// Concurrent creations resolved by re-fetching the winning row
    pub static ref DEDUP_CONFLICTS: IntCounter = register_int_counter!(
        format!("{}_conversation_dedup_conflicts_total", METRIC_PREFIX),
        "Total duplicate-conversation conflicts resolved by re-fetch"
    ).unwrap();

    /// Messages appended
    pub static ref MESSAGES_APPENDED: IntCounter = register_int_counter!(
        format!("{}_messages_appended_total", METRIC_PREFIX),
        "Total messages appended to conversations"
    ).unwrap();

    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Notifications persisted by type
    pub static ref NOTIFICATIONS_CREATED: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_created_total", METRIC_PREFIX),
        "Total notifications persisted",
        &["type"]
    ).unwrap();

    /// Live pushes by outcome (delivered, offline, dropped)
    pub static ref REALTIME_PUSHES: IntCounterVec = register_int_counter_vec!(
        format!("{}_realtime_pushes_total", METRIC_PREFIX),
        "Total live pushes by outcome",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Cluster Metrics
    // ============================================================================

    /// Room events published to other nodes
    pub static ref CLUSTER_EVENTS_PUBLISHED: IntCounter = register_int_counter!(
        format!("{}_cluster_events_published_total", METRIC_PREFIX),
        "Total room events published to the cluster relay"
    ).unwrap();

    /// Room events received from other nodes
    pub static ref CLUSTER_EVENTS_RECEIVED: IntCounter = register_int_counter!(
        format!("{}_cluster_events_received_total", METRIC_PREFIX),
        "Total room events received from the cluster relay"
    ).unwrap();

    /// Relay publish failures
    pub static ref CLUSTER_PUBLISH_FAILURES: IntCounter = register_int_counter!(
        format!("{}_cluster_publish_failures_total", METRIC_PREFIX),
        "Total failed publishes to the cluster relay"
    ).unwrap();
}
