use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Subscribe this session to a user's room
    Join(String),
    /// Relay `{from, message}` to `to`'s room; not persisted
    PrivateMessage { from: String, to: String, message: Value },
    /// Relay an arbitrary notification payload to `to`'s room
    Notification { to: String, notification: Value },
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum ServerMessage {
    NewMessage { from: String, message: Value },
    NewNotification(Value),
    Joined { room: String },
    Pong,
    Heartbeat,
    Error { code: String, message: String },
}

impl ServerMessage {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn joined(room: impl Into<String>) -> Self {
        Self::Joined { room: room.into() }
    }

    /// Wire name of the frame type
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::NewMessage { .. } => "newMessage",
            ServerMessage::NewNotification(_) => "newNotification",
            ServerMessage::Joined { .. } => "joined",
            ServerMessage::Pong => "pong",
            ServerMessage::Heartbeat => "heartbeat",
            ServerMessage::Error { .. } => "error",
        }
    }
}
