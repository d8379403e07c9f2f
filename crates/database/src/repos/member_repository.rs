//! Repository for room membership data access operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::RoomMember;
use crate::types::{DatabaseError, DatabaseResult};
use crate::util::now_timestamp;

#[derive(Clone)]
pub struct MemberRepository {
    pool: SqlitePool,
}

impl MemberRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, room_id: i64, user_id: i64) -> DatabaseResult<Option<RoomMember>> {
        let row = sqlx::query(
            "SELECT id, room_id, user_id, is_admin, joined_at
             FROM room_members WHERE room_id = ? AND user_id = ?",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_member).transpose()
    }

    pub async fn is_member(&self, room_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM room_members WHERE room_id = ? AND user_id = ?")
                .bind(room_id)
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    pub async fn is_admin(&self, room_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM room_members WHERE room_id = ? AND user_id = ? AND is_admin = 1",
        )
        .bind(room_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.is_some())
    }

    pub async fn count(&self, room_id: i64) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM room_members WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Inserts a membership row. A concurrent duplicate surfaces as
    /// [`DatabaseError::Duplicate`].
    pub async fn insert(
        &self,
        room_id: i64,
        user_id: i64,
        is_admin: bool,
    ) -> DatabaseResult<RoomMember> {
        let now = now_timestamp();

        let id = sqlx::query(
            "INSERT INTO room_members (room_id, user_id, is_admin, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(is_admin)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| DatabaseError::from_insert(e, "room membership"))?
        .last_insert_rowid();

        info!(room_id, user_id, is_admin, "added member to room");

        Ok(RoomMember {
            id,
            room_id,
            user_id,
            is_admin,
            joined_at: now,
        })
    }

    /// Deletes the membership unless it is the room's last admin.
    ///
    /// Returns `false` when nothing was deleted, either because the row is
    /// missing or because it holds the last admin seat.
    pub async fn delete_unless_last_admin(&self, room_id: i64, user_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "DELETE FROM room_members
             WHERE room_id = ? AND user_id = ?
               AND (is_admin = 0
                    OR (SELECT COUNT(*) FROM room_members WHERE room_id = ? AND is_admin = 1) > 1)",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(room_id)
        .execute(&self.pool)
        .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(room_id, user_id, "removed member from room");
        }
        Ok(removed)
    }
}

fn map_member(row: &SqliteRow) -> DatabaseResult<RoomMember> {
    Ok(RoomMember {
        id: row.try_get("id")?,
        room_id: row.try_get("room_id")?,
        user_id: row.try_get("user_id")?,
        is_admin: row.try_get("is_admin")?,
        joined_at: row.try_get("joined_at")?,
    })
}
