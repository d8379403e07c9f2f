//! Message entity definitions

use serde::Serialize;

/// A persisted message joined with its room and sender.
///
/// `content` is ciphertext when `encrypted` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMessage {
    pub id: i64,
    pub public_id: String,
    pub room_id: i64,
    pub room_public_id: String,
    pub sender_id: i64,
    pub sender_username: String,
    pub content: String,
    pub attachment_ref: Option<String>,
    pub encrypted: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub room_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub attachment_ref: Option<String>,
    pub encrypted: bool,
}
