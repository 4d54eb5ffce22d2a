use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::websocket::ServerMessage;

use super::{EmitResult, RegistryStats, SessionHandle};

/// Tracks live sessions and the per-user rooms they joined.
///
/// A room is named after a user identity; one user may have several
/// sessions (devices) in their room. Rooms exist only while non-empty.
pub struct ConnectionManager {
    /// session_id -> SessionHandle
    sessions: DashMap<Uuid, Arc<SessionHandle>>,
    /// room -> Set<session_id>
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Register a new session; it joins no room until it announces one
    pub fn register(
        &self,
        principal: Option<String>,
        sender: mpsc::Sender<ServerMessage>,
    ) -> Arc<SessionHandle> {
        let handle = Arc::new(SessionHandle::new(principal, sender));
        self.sessions.insert(handle.id, handle.clone());

        tracing::info!(
            session_id = %handle.id,
            principal = ?handle.principal,
            "Session registered"
        );

        handle
    }

    /// Remove a session from the registry and from every room it joined
    pub fn unregister(&self, session_id: Uuid) -> Option<Arc<SessionHandle>> {
        let (_, handle) = self.sessions.remove(&session_id)?;

        let rooms: Vec<String> = handle.lock_rooms().drain().collect();
        for room in &rooms {
            self.remove_from_room(room, session_id);
        }

        tracing::info!(
            session_id = %session_id,
            rooms = ?rooms,
            "Session unregistered"
        );

        Some(handle)
    }

    /// Add a session to `room`. Returns `false` if the session is gone.
    pub fn join(&self, session_id: Uuid, room: &str) -> bool {
        // Holding the session entry keeps a concurrent unregister from
        // running until the room membership is recorded on both sides
        let Some(handle) = self.sessions.get(&session_id) else {
            return false;
        };

        handle.lock_rooms().insert(room.to_string());
        self.rooms
            .entry(room.to_string())
            .or_default()
            .insert(session_id);
        drop(handle);

        tracing::debug!(session_id = %session_id, room = %room, "Joined room");
        true
    }

    /// Remove a session from one room
    pub fn leave(&self, session_id: Uuid, room: &str) -> bool {
        let Some(handle) = self.sessions.get(&session_id) else {
            return false;
        };

        let was_member = handle.lock_rooms().remove(room);
        drop(handle);

        if was_member {
            self.remove_from_room(room, session_id);
            tracing::debug!(session_id = %session_id, room = %room, "Left room");
        }
        was_member
    }

    fn remove_from_room(&self, room: &str, session_id: Uuid) {
        if let Some(mut members) = self.rooms.get_mut(room) {
            members.remove(&session_id);
        }
        self.rooms.remove_if(room, |_, members| members.is_empty());
    }

    /// Sessions currently in `room`
    pub fn room_sessions(&self, room: &str) -> Vec<Arc<SessionHandle>> {
        let ids: Vec<Uuid> = self
            .rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default();

        ids.iter()
            .filter_map(|id| self.sessions.get(id).map(|h| h.clone()))
            .collect()
    }

    /// Deliver `message` to every session in `room` at the moment of the call.
    ///
    /// Delivery is at-most-once: a session whose buffer is full or closed
    /// misses the message. An absent room is a silent no-op.
    pub fn emit_to_room(&self, room: &str, message: &ServerMessage) -> EmitResult {
        let mut result = EmitResult::default();

        for session in self.room_sessions(room) {
            match session.try_send(message.clone()) {
                Ok(()) => result.delivered += 1,
                Err(e) => {
                    result.dropped += 1;
                    tracing::debug!(
                        session_id = %session.id,
                        room = %room,
                        error = %e,
                        "Dropped room message"
                    );
                }
            }
        }

        result
    }

    pub fn has_room(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }

    /// Get session by ID
    pub fn get_session(&self, session_id: Uuid) -> Option<Arc<SessionHandle>> {
        self.sessions.get(&session_id).map(|h| h.clone())
    }

    /// Get all sessions (for heartbeat sending)
    pub fn all_sessions(&self) -> Vec<Arc<SessionHandle>> {
        self.sessions.iter().map(|r| r.value().clone()).collect()
    }

    /// Get statistics
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_sessions: self.sessions.len(),
            authenticated_sessions: self
                .sessions
                .iter()
                .filter(|s| s.principal.is_some())
                .count(),
            rooms: self.rooms.len(),
        }
    }

    /// Find sessions that have been inactive for longer than the timeout
    pub fn find_stale_sessions(&self, timeout_secs: u64) -> Vec<Uuid> {
        let now = Utc::now();
        let timeout = chrono::Duration::seconds(timeout_secs as i64);

        self.sessions
            .iter()
            .filter(|entry| now.signed_duration_since(entry.value().last_activity()) > timeout)
            .map(|entry| *entry.key())
            .collect()
    }

    /// Remove stale sessions and return the count of removed sessions
    pub fn cleanup_stale_sessions(&self, timeout_secs: u64) -> usize {
        let stale = self.find_stale_sessions(timeout_secs);
        let count = stale.len();

        for session_id in stale {
            tracing::info!(session_id = %session_id, "Removing stale session due to timeout");
            self.unregister(session_id);
        }

        count
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(manager: &ConnectionManager, principal: Option<&str>) -> (Arc<SessionHandle>, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(8);
        (manager.register(principal.map(str::to_string), tx), rx)
    }

    #[test]
    fn test_join_and_emit_reaches_every_device() {
        let manager = ConnectionManager::new();
        let (phone, mut phone_rx) = session(&manager, Some("u1"));
        let (laptop, mut laptop_rx) = session(&manager, Some("u1"));
        let (_other, mut other_rx) = session(&manager, Some("u2"));

        assert!(manager.join(phone.id, "u1"));
        assert!(manager.join(laptop.id, "u1"));

        let result = manager.emit_to_room("u1", &ServerMessage::Pong);
        assert_eq!(result, EmitResult { delivered: 2, dropped: 0 });
        assert!(matches!(phone_rx.try_recv(), Ok(ServerMessage::Pong)));
        assert!(matches!(laptop_rx.try_recv(), Ok(ServerMessage::Pong)));
        assert!(other_rx.try_recv().is_err());
    }

    #[test]
    fn test_emit_to_absent_room_is_noop() {
        let manager = ConnectionManager::new();
        let result = manager.emit_to_room("nobody", &ServerMessage::Heartbeat);
        assert!(result.is_empty());
    }

    #[test]
    fn test_unregister_leaves_every_room() {
        let manager = ConnectionManager::new();
        let (handle, _rx) = session(&manager, None);
        manager.join(handle.id, "u1");
        manager.join(handle.id, "u2");
        assert_eq!(manager.stats().rooms, 2);

        manager.unregister(handle.id);

        assert!(!manager.has_room("u1"));
        assert!(!manager.has_room("u2"));
        assert_eq!(manager.stats().total_sessions, 0);
        assert!(!manager.join(handle.id, "u1"));
    }

    #[test]
    fn test_room_survives_while_other_device_connected() {
        let manager = ConnectionManager::new();
        let (first, _rx1) = session(&manager, Some("u1"));
        let (second, _rx2) = session(&manager, Some("u1"));
        manager.join(first.id, "u1");
        manager.join(second.id, "u1");

        manager.unregister(first.id);

        assert!(manager.has_room("u1"));
        assert_eq!(manager.room_sessions("u1").len(), 1);
    }

    #[test]
    fn test_leave() {
        let manager = ConnectionManager::new();
        let (handle, _rx) = session(&manager, None);
        manager.join(handle.id, "u1");

        assert!(manager.leave(handle.id, "u1"));
        assert!(!manager.leave(handle.id, "u1"));
        assert!(!manager.has_room("u1"));
        assert!(handle.rooms().is_empty());
    }

    #[test]
    fn test_full_buffer_is_dropped() {
        let manager = ConnectionManager::new();
        let (tx, _rx) = mpsc::channel(1);
        let handle = manager.register(None, tx);
        manager.join(handle.id, "u1");

        manager.emit_to_room("u1", &ServerMessage::Heartbeat);
        let result = manager.emit_to_room("u1", &ServerMessage::Heartbeat);
        assert_eq!(result, EmitResult { delivered: 0, dropped: 1 });
    }

    #[test]
    fn test_cleanup_stale_sessions() {
        let manager = ConnectionManager::new();
        let (handle, _rx) = session(&manager, None);
        manager.join(handle.id, "u1");

        assert_eq!(manager.cleanup_stale_sessions(60), 0);
        assert!(manager.get_session(handle.id).is_some());
        assert!(manager.find_stale_sessions(60).is_empty());
    }

    #[test]
    fn test_concurrent_join_and_unregister_leave_no_orphans() {
        let manager = Arc::new(ConnectionManager::new());
        let mut threads = Vec::new();

        for _ in 0..8 {
            let manager = manager.clone();
            threads.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    let (tx, _rx) = mpsc::channel(1);
                    let handle = manager.register(None, tx);
                    manager.join(handle.id, "shared");
                    manager.unregister(handle.id);
                }
            }));
        }
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(manager.stats().total_sessions, 0);
        assert!(!manager.has_room("shared"));
    }
}
