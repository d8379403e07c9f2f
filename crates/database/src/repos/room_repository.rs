//! Repository for room data access operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::entities::{NewRoom, Room, RoomVisibility};
use crate::types::{DatabaseError, DatabaseResult};
use crate::util::{new_public_id, now_timestamp};

const ROOM_SELECT: &str = "SELECT r.id, r.public_id, r.name, r.visibility, r.created_by,
        u.username AS creator_username,
        (SELECT COUNT(*) FROM room_members m WHERE m.room_id = r.id) AS member_count,
        r.created_at, r.updated_at
     FROM rooms r
     JOIN users u ON u.id = r.created_by";

/// Repository for room database operations
#[derive(Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts the room together with its creator's admin membership.
    ///
    /// Both rows commit in one transaction, so a room is never visible
    /// without an admin.
    pub async fn create_with_admin(&self, request: &NewRoom) -> DatabaseResult<Room> {
        let now = now_timestamp();
        let public_id = new_public_id();

        let mut tx = self.pool.begin().await?;

        let room_id = sqlx::query(
            "INSERT INTO rooms (public_id, name, visibility, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(&request.name)
        .bind(request.visibility.as_str())
        .bind(request.created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO room_members (room_id, user_id, is_admin, joined_at) VALUES (?, ?, 1, ?)",
        )
        .bind(room_id)
        .bind(request.created_by)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(
            room_id = %public_id,
            created_by = request.created_by,
            visibility = %request.visibility,
            "created room"
        );

        self.find_by_id(room_id)
            .await?
            .ok_or_else(|| DatabaseError::InvalidData(format!("room {public_id} vanished after insert")))
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<Room>> {
        let sql = format!("{ROOM_SELECT} WHERE r.id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_room).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Room>> {
        let sql = format!("{ROOM_SELECT} WHERE r.public_id = ?");
        let row = sqlx::query(&sql)
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_room).transpose()
    }

    /// Rooms the user belongs to, newest first.
    pub async fn list_for_user(&self, user_id: i64) -> DatabaseResult<Vec<Room>> {
        let sql = format!(
            "{ROOM_SELECT}
             WHERE r.id IN (SELECT room_id FROM room_members WHERE user_id = ?)
             ORDER BY r.created_at DESC, r.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_room).collect()
    }

    /// Public rooms, newest first.
    pub async fn list_public(&self, limit: i64, offset: i64) -> DatabaseResult<Vec<Room>> {
        let sql = format!(
            "{ROOM_SELECT}
             WHERE r.visibility = 'public'
             ORDER BY r.created_at DESC, r.id DESC
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_room).collect()
    }

    pub async fn count_public(&self) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE visibility = 'public'")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn map_room(row: &SqliteRow) -> DatabaseResult<Room> {
    let visibility: String = row.try_get("visibility")?;
    Ok(Room {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        name: row.try_get("name")?,
        visibility: visibility.parse::<RoomVisibility>()?,
        created_by: row.try_get("created_by")?,
        creator_username: row.try_get("creator_username")?,
        member_count: row.try_get("member_count")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
