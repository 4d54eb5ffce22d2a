//! Routes room events to local sessions and, in cluster mode, to the
//! other service instances through the relay.

use std::sync::Arc;

use crate::connection_manager::{ConnectionManager, EmitResult};
use crate::metrics::ClusterMetrics;
use crate::websocket::ServerMessage;

use super::{ClusterRelay, RoutedEvent};

pub struct ClusterRouter {
    connection_manager: Arc<ConnectionManager>,
    relay: Option<Arc<ClusterRelay>>,
}

impl ClusterRouter {
    /// Single-instance router
    pub fn local(connection_manager: Arc<ConnectionManager>) -> Self {
        Self {
            connection_manager,
            relay: None,
        }
    }

    pub fn with_relay(connection_manager: Arc<ConnectionManager>, relay: Arc<ClusterRelay>) -> Self {
        Self {
            connection_manager,
            relay: Some(relay),
        }
    }

    pub fn relay(&self) -> Option<&Arc<ClusterRelay>> {
        self.relay.as_ref()
    }

    pub fn server_id(&self) -> Option<&str> {
        self.relay.as_deref().map(ClusterRelay::server_id)
    }

    /// Deliver `message` to `user_id`'s room on this instance and publish it
    /// for the others. Never fails; relay errors are logged.
    pub async fn route_to_user(&self, user_id: &str, message: ServerMessage) -> RouteResult {
        let emitted = self.connection_manager.emit_to_room(user_id, &message);

        let published = match self.relay {
            Some(ref relay) => match relay.publish(user_id, &message).await {
                Ok(()) => {
                    ClusterMetrics::record_published();
                    true
                }
                Err(e) => {
                    ClusterMetrics::record_publish_failed();
                    tracing::warn!(
                        error = %e,
                        user_id = %user_id,
                        "Failed to publish room event to cluster"
                    );
                    false
                }
            },
            None => false,
        };

        tracing::debug!(
            user_id = %user_id,
            frame = message.kind(),
            delivered = emitted.delivered,
            dropped = emitted.dropped,
            published = published,
            "Routed room event"
        );

        RouteResult {
            local_delivered: emitted.delivered,
            dropped: emitted.dropped,
            published,
        }
    }

    /// Deliver an event received from another instance to local sessions
    pub fn deliver_routed(&self, event: RoutedEvent) -> EmitResult {
        if self.server_id() == Some(event.from_server.as_str()) {
            return EmitResult::default();
        }

        ClusterMetrics::record_received();
        let result = self.connection_manager.emit_to_room(&event.room, &event.message);

        tracing::debug!(
            from_server = %event.from_server,
            room = %event.room,
            delivered = result.delivered,
            "Delivered routed event"
        );

        result
    }
}

/// Result of routing one event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteResult {
    /// Local sessions whose buffer accepted the event
    pub local_delivered: usize,
    /// Local sessions that missed it (full or closed buffer)
    pub dropped: usize,
    /// Whether the event was handed to the cluster relay
    pub published: bool,
}
