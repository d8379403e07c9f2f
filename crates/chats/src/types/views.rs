//! Response shapes returned by the chat services.

use backchannel_database::{Room, RoomMember, RoomVisibility};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRef {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomView {
    pub id: String,
    pub name: String,
    pub visibility: RoomVisibility,
    pub created_by: UserRef,
    pub member_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Room> for RoomView {
    fn from(room: Room) -> Self {
        Self {
            id: room.public_id,
            name: room.name,
            visibility: room.visibility,
            created_by: UserRef {
                id: room.created_by,
                username: room.creator_username,
            },
            member_count: room.member_count,
            created_at: room.created_at,
            updated_at: room.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MembershipView {
    pub room_id: String,
    pub user_id: i64,
    pub is_admin: bool,
    pub joined_at: String,
}

impl MembershipView {
    pub fn new(room_public_id: impl Into<String>, member: RoomMember) -> Self {
        Self {
            room_id: room_public_id.into(),
            user_id: member.user_id,
            is_admin: member.is_admin,
            joined_at: member.joined_at,
        }
    }
}

/// Outcome of the idempotent public join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinOutcome {
    pub membership: MembershipView,
    /// False when the user already belonged to the room.
    pub newly_joined: bool,
}

/// A message as returned to clients, always with readable content.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    pub id: String,
    pub room_id: String,
    pub sender: UserRef,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_ref: Option<String>,
    pub encrypted: bool,
    pub created_at: String,
}
