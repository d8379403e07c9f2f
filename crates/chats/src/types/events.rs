//! Live events fanned out to room subscribers. These are never persisted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveEventKind {
    Chat,
    Typing,
    Join,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSender {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveEvent {
    pub room_id: String,
    pub kind: LiveEventKind,
    pub sender: EventSender,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    pub created_at: String,
}

impl LiveEvent {
    /// A presence event (typing, join or leave) without a payload.
    pub fn presence(
        room_id: impl Into<String>,
        kind: LiveEventKind,
        sender: EventSender,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            room_id: room_id.into(),
            kind,
            sender,
            message_id: None,
            content: None,
            attachment_ref: None,
            created_at: created_at.into(),
        }
    }
}
