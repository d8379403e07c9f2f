//! Repository for message data access operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::entities::{NewMessage, StoredMessage};
use crate::types::{DatabaseError, DatabaseResult};
use crate::util::{new_public_id, now_timestamp};

const MESSAGE_SELECT: &str = "SELECT m.id, m.public_id, m.room_id, r.public_id AS room_public_id,
        m.sender_id, u.username AS sender_username,
        m.content, m.attachment_ref, m.encrypted, m.created_at
     FROM messages m
     JOIN rooms r ON r.id = m.room_id
     JOIN users u ON u.id = m.sender_id";

#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Persists a message. The creation timestamp is always assigned here.
    pub async fn insert(&self, request: &NewMessage) -> DatabaseResult<StoredMessage> {
        let public_id = new_public_id();
        let now = now_timestamp();

        let id = sqlx::query(
            "INSERT INTO messages (public_id, room_id, sender_id, content, attachment_ref, encrypted, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(request.room_id)
        .bind(request.sender_id)
        .bind(&request.content)
        .bind(request.attachment_ref.as_deref())
        .bind(request.encrypted)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        debug!(
            message_id = %public_id,
            room_id = request.room_id,
            sender_id = request.sender_id,
            encrypted = request.encrypted,
            "stored message"
        );

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::InvalidData(format!("message {public_id} vanished after insert")))
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<StoredMessage>> {
        let sql = format!("{MESSAGE_SELECT} WHERE m.id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(map_message).transpose()
    }

    /// Full history of a room, oldest first.
    pub async fn list_ascending(&self, room_id: i64) -> DatabaseResult<Vec<StoredMessage>> {
        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.room_id = ? ORDER BY m.created_at ASC, m.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(room_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_message).collect()
    }

    /// A page of a room's messages, newest first.
    pub async fn list_recent(
        &self,
        room_id: i64,
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<Vec<StoredMessage>> {
        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.room_id = ?
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(room_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(map_message).collect()
    }

    pub async fn count_for_room(&self, room_id: i64) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE room_id = ?")
            .bind(room_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Unencrypted messages whose content contains every term, newest first.
    ///
    /// `LIKE` folds ASCII case only, so other letters must match exactly.
    /// `%`, `_` and `\` in terms are matched literally.
    pub async fn search_plaintext(
        &self,
        room_id: i64,
        terms: &[String],
        limit: i64,
        offset: i64,
    ) -> DatabaseResult<(Vec<StoredMessage>, i64)> {
        let filter = search_filter(terms.len());
        let patterns: Vec<String> = terms.iter().map(|term| like_pattern(term)).collect();

        let count_sql = format!(
            "SELECT COUNT(*) FROM messages m WHERE m.room_id = ? AND m.encrypted = 0{filter}"
        );
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(room_id);
        for pattern in &patterns {
            count_query = count_query.bind(pattern.as_str());
        }
        let total = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "{MESSAGE_SELECT} WHERE m.room_id = ? AND m.encrypted = 0{filter}
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT ? OFFSET ?"
        );
        let mut query = sqlx::query(&sql).bind(room_id);
        for pattern in &patterns {
            query = query.bind(pattern.as_str());
        }
        let rows = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let messages = rows.iter().map(map_message).collect::<DatabaseResult<Vec<_>>>()?;
        Ok((messages, total))
    }
}

fn search_filter(terms: usize) -> String {
    " AND m.content LIKE ? ESCAPE '\\'".repeat(terms)
}

fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn map_message(row: &SqliteRow) -> DatabaseResult<StoredMessage> {
    Ok(StoredMessage {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        room_id: row.try_get("room_id")?,
        room_public_id: row.try_get("room_public_id")?,
        sender_id: row.try_get("sender_id")?,
        sender_username: row.try_get("sender_username")?,
        content: row.try_get("content")?,
        attachment_ref: row.try_get("attachment_ref")?,
        encrypted: row.try_get("encrypted")?,
        created_at: row.try_get("created_at")?,
    })
}
