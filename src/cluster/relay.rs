//! Redis pub/sub relay carrying room events between service instances.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::{ClusterConfig, RedisConfig};
use crate::redis::ExponentialBackoff;
use crate::websocket::ServerMessage;

use super::ClusterRouter;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Relay stream ended")]
    StreamEnded,

    #[error("Publish did not complete within {0:?}")]
    Timeout(Duration),
}

/// A room event as it travels between instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedEvent {
    pub from_server: String,
    pub room: String,
    pub message: ServerMessage,
}

/// Publishing side of the relay
pub struct ClusterRelay {
    connection: redis::aio::ConnectionManager,
    redis_url: String,
    server_id: String,
    channel: String,
    publish_timeout: Duration,
}

impl ClusterRelay {
    pub async fn connect(redis: &RedisConfig, cluster: &ClusterConfig) -> Result<Self, RelayError> {
        let client = redis::Client::open(redis.url.as_str())?;
        let connection = client.get_connection_manager().await?;
        let server_id = resolve_server_id(&cluster.server_id);

        tracing::info!(
            server_id = %server_id,
            routing_channel = %cluster.routing_channel,
            "Cluster relay connected"
        );

        Ok(Self {
            connection,
            redis_url: redis.url.clone(),
            server_id,
            channel: cluster.routing_channel.clone(),
            publish_timeout: Duration::from_millis(cluster.publish_timeout_ms),
        })
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn publish(&self, room: &str, message: &ServerMessage) -> Result<(), RelayError> {
        let event = RoutedEvent {
            from_server: self.server_id.clone(),
            room: room.to_string(),
            message: message.clone(),
        };
        let payload = serde_json::to_string(&event)?;

        let mut connection = self.connection.clone();
        within(self.publish_timeout, async move {
            connection.publish::<_, _, ()>(&self.channel, payload).await?;
            Ok(())
        })
        .await
    }
}

/// Bound a relay operation so a stalled Redis cannot hold up the caller
async fn within<F>(limit: Duration, operation: F) -> Result<(), RelayError>
where
    F: Future<Output = Result<(), RelayError>>,
{
    tokio::time::timeout(limit, operation)
        .await
        .map_err(|_| RelayError::Timeout(limit))?
}

/// Generate an instance id when none is configured
fn resolve_server_id(configured: &str) -> String {
    if configured.trim().is_empty() {
        format!("jobboard-{}", &Uuid::new_v4().simple().to_string()[..8])
    } else {
        configured.to_string()
    }
}

/// Background task delivering events published by other instances
pub struct RelaySubscriber {
    redis_url: String,
    server_id: String,
    channel: String,
    router: Arc<ClusterRouter>,
    shutdown: broadcast::Receiver<()>,
}

impl RelaySubscriber {
    pub fn new(
        relay: &ClusterRelay,
        router: Arc<ClusterRouter>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            redis_url: relay.redis_url.clone(),
            server_id: relay.server_id.clone(),
            channel: relay.channel.clone(),
            router,
            shutdown,
        }
    }

    /// Run the subscriber task with automatic reconnection
    pub async fn run(mut self) {
        tracing::info!(
            server_id = %self.server_id,
            routing_channel = %self.channel,
            "Relay subscriber starting"
        );

        let mut backoff = ExponentialBackoff::new();

        loop {
            match self.run_subscription_loop(&mut backoff).await {
                Ok(()) => {
                    tracing::info!("Relay subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::error!(
                        error = %e,
                        attempt = backoff.attempt(),
                        retry_delay_ms = delay.as_millis() as u64,
                        "Relay subscription error, reconnecting"
                    );

                    tokio::select! {
                        _ = self.shutdown.recv() => {
                            tracing::info!("Shutdown requested during reconnect delay");
                            break;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn run_subscription_loop(&mut self, backoff: &mut ExponentialBackoff) -> Result<(), RelayError> {
        // Pub/sub requires a dedicated connection
        let client = redis::Client::open(self.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;
        pubsub.subscribe(&self.channel).await?;
        backoff.reset();

        tracing::info!(channel = %self.channel, "Subscribed to relay channel");

        let mut messages = pubsub.on_message();

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.recv() => {
                    tracing::info!("Relay subscriber received shutdown signal");
                    return Ok(());
                }

                msg = messages.next() => {
                    let Some(msg) = msg else {
                        return Err(RelayError::StreamEnded);
                    };

                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to read relay payload");
                            continue;
                        }
                    };

                    self.handle_payload(&payload);
                }
            }
        }
    }

    fn handle_payload(&self, payload: &str) {
        let event: RoutedEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to parse relay event");
                return;
            }
        };

        self.router.deliver_routed(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_server_id() {
        assert_eq!(resolve_server_id("node-a"), "node-a");

        let generated = resolve_server_id("");
        assert!(generated.starts_with("jobboard-"));
        assert_eq!(generated.len(), "jobboard-".len() + 8);
    }

    #[test]
    fn test_routed_event_serialization() {
        let event = RoutedEvent {
            from_server: "node-a".into(),
            room: "u2".into(),
            message: ServerMessage::NewMessage {
                from: "u1".into(),
                message: json!("hi"),
            },
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: RoutedEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.from_server, "node-a");
        assert_eq!(parsed.room, "u2");
        assert!(matches!(parsed.message, ServerMessage::NewMessage { .. }));
    }

    #[tokio::test]
    async fn test_stalled_publish_is_cut_off() {
        let limit = Duration::from_millis(20);
        let started = std::time::Instant::now();

        let result = within(limit, std::future::pending()).await;

        assert!(matches!(result, Err(RelayError::Timeout(d)) if d == limit));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_prompt_publish_passes_through() {
        assert!(within(Duration::from_millis(20), async { Ok(()) }).await.is_ok());

        let failed = within(Duration::from_millis(20), async { Err(RelayError::StreamEnded) }).await;
        assert!(matches!(failed, Err(RelayError::StreamEnded)));
    }
}
