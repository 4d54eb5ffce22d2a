//! Session handle and related types

use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::ServerMessage;

/// Handle for a single live WebSocket session
pub struct SessionHandle {
    pub id: Uuid,
    /// Identity proven by the upgrade token; `None` for anonymous sessions
    pub principal: Option<String>,
    pub sender: mpsc::Sender<ServerMessage>,
    pub connected_at: DateTime<Utc>,
    /// Last activity timestamp (Unix seconds) - using AtomicI64 for lock-free updates
    last_activity: AtomicI64,
    /// Rooms this session has joined
    rooms: Mutex<HashSet<String>>,
}

impl SessionHandle {
    pub fn new(principal: Option<String>, sender: mpsc::Sender<ServerMessage>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            principal,
            sender,
            connected_at: now,
            last_activity: AtomicI64::new(now.timestamp()),
            rooms: Mutex::new(HashSet::new()),
        }
    }

    pub fn update_activity(&self) {
        self.last_activity
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.last_activity.load(Ordering::Relaxed), 0)
            .unwrap_or_else(Utc::now)
    }

    /// Wait for buffer space and send
    pub async fn send(&self, message: ServerMessage) -> Result<(), mpsc::error::SendError<ServerMessage>> {
        self.sender.send(message).await
    }

    /// Send without waiting; a full buffer drops the message
    pub fn try_send(&self, message: ServerMessage) -> Result<(), mpsc::error::TrySendError<ServerMessage>> {
        self.sender.try_send(message)
    }

    /// Whether this session may act as `user_id`
    pub fn may_act_as(&self, user_id: &str) -> bool {
        match self.principal {
            Some(ref principal) => principal == user_id,
            None => true,
        }
    }

    pub fn rooms(&self) -> Vec<String> {
        self.lock_rooms().iter().cloned().collect()
    }

    pub(super) fn lock_rooms(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked
        self.rooms.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_may_act_as() {
        let (tx, _rx) = mpsc::channel(1);
        let authenticated = SessionHandle::new(Some("u1".into()), tx.clone());
        assert!(authenticated.may_act_as("u1"));
        assert!(!authenticated.may_act_as("u2"));

        let anonymous = SessionHandle::new(None, tx);
        assert!(anonymous.may_act_as("anyone"));
    }

    #[test]
    fn test_try_send_drops_when_full() {
        let (tx, _rx) = mpsc::channel(1);
        let session = SessionHandle::new(None, tx);

        assert!(session.try_send(ServerMessage::Heartbeat).is_ok());
        assert!(session.try_send(ServerMessage::Heartbeat).is_err());
    }
}
