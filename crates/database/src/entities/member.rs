//! Membership entity definitions

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomMember {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub is_admin: bool,
    pub joined_at: String,
}
