//! Periodic session sweep.
//!
//! Every `websocket.heartbeat_interval` seconds the sweep evicts sessions idle
//! past `websocket.connection_timeout`, then queues a `heartbeat` frame on each
//! remaining session. Frames are queued with `try_send`, so a slow client never
//! stalls the sweep; sessions whose socket task has already gone away are
//! unregistered on the spot.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc::error::TrySendError};
use tokio::time::MissedTickBehavior;

use crate::config::WebSocketConfig;
use crate::connection_manager::ConnectionManager;
use crate::metrics::HeartbeatMetrics;
use crate::websocket::ServerMessage;

/// Outcome of one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions that got a heartbeat frame queued
    pub pinged: usize,
    /// Sessions whose outbound buffer was full; they stay registered
    pub backlogged: usize,
    /// Sessions whose receiver was gone; unregistered
    pub closed: usize,
    /// Sessions evicted for inactivity
    pub idle_removed: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.closed + self.idle_removed
    }
}

pub struct HeartbeatTask {
    config: WebSocketConfig,
    registry: Arc<ConnectionManager>,
    shutdown: broadcast::Receiver<()>,
}

impl HeartbeatTask {
    pub fn new(
        config: WebSocketConfig,
        registry: Arc<ConnectionManager>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            registry,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let period = Duration::from_secs(self.config.heartbeat_interval.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        tracing::info!(
            heartbeat_interval_secs = period.as_secs(),
            connection_timeout_secs = self.config.connection_timeout,
            "Session sweep started"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.recv() => break,
                _ = ticker.tick() => {
                    let report = self.sweep();
                    if report.removed() > 0 || report.backlogged > 0 {
                        tracing::info!(
                            pinged = report.pinged,
                            backlogged = report.backlogged,
                            closed = report.closed,
                            idle_removed = report.idle_removed,
                            "Session sweep"
                        );
                    }
                }
            }
        }

        tracing::info!("Session sweep stopped");
    }

    /// One pass over the registry
    pub fn sweep(&self) -> SweepReport {
        let started = Instant::now();
        let mut report = SweepReport {
            idle_removed: self
                .registry
                .cleanup_stale_sessions(self.config.connection_timeout),
            ..Default::default()
        };

        for session in self.registry.all_sessions() {
            match session.try_send(ServerMessage::Heartbeat) {
                Ok(()) => report.pinged += 1,
                Err(TrySendError::Full(_)) => report.backlogged += 1,
                Err(TrySendError::Closed(_)) => {
                    self.registry.unregister(session.id);
                    report.closed += 1;
                }
            }
        }

        HeartbeatMetrics::record_duration_ms(started.elapsed().as_millis() as u64);
        if report.removed() > 0 {
            HeartbeatMetrics::record_stale_removed(report.removed() as u64);
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn task(config: WebSocketConfig, registry: Arc<ConnectionManager>) -> (HeartbeatTask, broadcast::Sender<()>) {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        (HeartbeatTask::new(config, registry, shutdown_rx), shutdown_tx)
    }

    fn active_config() -> WebSocketConfig {
        WebSocketConfig {
            heartbeat_interval: 1,
            connection_timeout: 600,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sweep_pings_every_session() {
        let registry = Arc::new(ConnectionManager::new());
        let (phone_tx, mut phone_rx) = mpsc::channel(4);
        let (laptop_tx, mut laptop_rx) = mpsc::channel(4);
        registry.register(Some("u1".into()), phone_tx);
        registry.register(Some("u1".into()), laptop_tx);

        let (task, _shutdown) = task(active_config(), registry);
        let report = task.sweep();

        assert_eq!(report.pinged, 2);
        assert_eq!(report.removed(), 0);
        assert!(matches!(phone_rx.try_recv(), Ok(ServerMessage::Heartbeat)));
        assert!(matches!(laptop_rx.try_recv(), Ok(ServerMessage::Heartbeat)));
    }

    #[tokio::test]
    async fn test_full_buffer_keeps_session() {
        let registry = Arc::new(ConnectionManager::new());
        let (tx, _rx) = mpsc::channel(1);
        let handle = registry.register(Some("u1".into()), tx);
        handle.try_send(ServerMessage::Heartbeat).unwrap();

        let (task, _shutdown) = task(active_config(), registry.clone());
        let report = task.sweep();

        assert_eq!(report.backlogged, 1);
        assert!(registry.get_session(handle.id).is_some());
    }

    #[tokio::test]
    async fn test_closed_session_is_unregistered() {
        let registry = Arc::new(ConnectionManager::new());
        let (tx, rx) = mpsc::channel(4);
        let handle = registry.register(Some("u1".into()), tx);
        registry.join(handle.id, "u1");
        drop(rx);

        let (task, _shutdown) = task(active_config(), registry.clone());
        let report = task.sweep();

        assert_eq!(report.closed, 1);
        assert!(registry.get_session(handle.id).is_none());
        assert!(!registry.has_room("u1"));
    }

    #[tokio::test]
    async fn test_idle_sessions_leave_their_rooms() {
        let registry = Arc::new(ConnectionManager::new());
        let (tx, _rx) = mpsc::channel(4);
        let handle = registry.register(Some("u1".into()), tx);
        registry.join(handle.id, "u1");

        let config = WebSocketConfig {
            connection_timeout: 0,
            ..active_config()
        };
        let (task, _shutdown) = task(config, registry.clone());

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let report = task.sweep();

        assert_eq!(report.idle_removed, 1);
        assert_eq!(report.pinged, 0);
        assert!(registry.get_session(handle.id).is_none());
        assert!(!registry.has_room("u1"));
    }

    #[tokio::test]
    async fn test_run_sends_heartbeats_until_shutdown() {
        let registry = Arc::new(ConnectionManager::new());
        let (tx, mut rx) = mpsc::channel(4);
        registry.register(Some("u1".into()), tx);

        let (task, shutdown) = task(active_config(), registry);
        let running = tokio::spawn(task.run());

        let frame = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("heartbeat within one interval")
            .expect("channel open");
        assert!(matches!(frame, ServerMessage::Heartbeat));

        shutdown.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("task stops on shutdown")
            .expect("task does not panic");
    }
}
