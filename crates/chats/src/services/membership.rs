//! Read-only membership checks.
//!
//! Every answer comes straight from the database; nothing is cached, so a
//! removal takes effect on the very next check.

use backchannel_database::{MemberRepository, RoomMember};
use sqlx::SqlitePool;

use crate::types::ChatResult;

#[derive(Clone)]
pub struct MembershipStore {
    members: MemberRepository,
}

impl MembershipStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            members: MemberRepository::new(pool),
        }
    }

    pub async fn is_member(&self, user_id: i64, room_id: i64) -> ChatResult<bool> {
        Ok(self.members.is_member(room_id, user_id).await?)
    }

    pub async fn is_admin(&self, user_id: i64, room_id: i64) -> ChatResult<bool> {
        Ok(self.members.is_admin(room_id, user_id).await?)
    }

    pub async fn membership(&self, user_id: i64, room_id: i64) -> ChatResult<Option<RoomMember>> {
        Ok(self.members.find(room_id, user_id).await?)
    }

    pub async fn member_count(&self, room_id: i64) -> ChatResult<i64> {
        Ok(self.members.count(room_id).await?)
    }

    pub(crate) fn repository(&self) -> &MemberRepository {
        &self.members
    }
}
