use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Application,
    Message,
    Job,
}

/// Kind of entity a notification points at; the key of the resolver table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Job,
    Message,
    Application,
}

/// Polymorphic reference to the entity a notification is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RelatedEntity {
    Job(String),
    Message(Uuid),
    Application(String),
}

/// Error returned when a stored tag or id cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {what}: {value}")]
pub struct ParseTagError {
    what: &'static str,
    value: String,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Application => "application",
            NotificationKind::Message => "message",
            NotificationKind::Job => "job",
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application" => Ok(NotificationKind::Application),
            "message" => Ok(NotificationKind::Message),
            "job" => Ok(NotificationKind::Job),
            other => Err(ParseTagError {
                what: "notification kind",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Job => "job",
            EntityKind::Message => "message",
            EntityKind::Application => "application",
        }
    }
}

impl FromStr for EntityKind {
    type Err = ParseTagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "job" => Ok(EntityKind::Job),
            "message" => Ok(EntityKind::Message),
            "application" => Ok(EntityKind::Application),
            other => Err(ParseTagError {
                what: "entity kind",
                value: other.to_string(),
            }),
        }
    }
}

impl RelatedEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            RelatedEntity::Job(_) => EntityKind::Job,
            RelatedEntity::Message(_) => EntityKind::Message,
            RelatedEntity::Application(_) => EntityKind::Application,
        }
    }

    /// Id in its storage form
    pub fn id_string(&self) -> String {
        match self {
            RelatedEntity::Job(id) | RelatedEntity::Application(id) => id.clone(),
            RelatedEntity::Message(id) => id.to_string(),
        }
    }

    /// Rebuild the typed reference from its stored `(kind, id)` columns
    pub fn from_parts(kind: &str, id: &str) -> Result<Self, ParseTagError> {
        match kind.parse::<EntityKind>()? {
            EntityKind::Job => Ok(RelatedEntity::Job(id.to_string())),
            EntityKind::Application => Ok(RelatedEntity::Application(id.to_string())),
            EntityKind::Message => Uuid::parse_str(id)
                .map(RelatedEntity::Message)
                .map_err(|_| ParseTagError {
                    what: "message id",
                    value: id.to_string(),
                }),
        }
    }
}

/// Input for creating a notification
#[derive(Debug, Clone)]
pub struct NotificationDraft {
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub text: String,
    pub related: Option<RelatedEntity>,
}

/// Persisted out-of-band alert for one recipient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// Human-readable text
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_entity: Option<RelatedEntity>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_draft(draft: NotificationDraft) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient_id: draft.recipient_id,
            kind: draft.kind,
            message: draft.text,
            related_entity: draft.related,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Notification with its related entity resolved for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    #[serde(flatten)]
    pub notification: Notification,
    pub related_details: Option<serde_json::Value>,
}
