//! Read-only user lookups for room and message services.
//!
//! Accounts are created and authenticated by the auth crate; this side only
//! needs to know that a user exists and what it is called.

use sqlx::{Row, SqlitePool};

use crate::entities::UserSummary;
use crate::types::DatabaseResult;

#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_summary(&self, id: i64) -> DatabaseResult<Option<UserSummary>> {
        let row = sqlx::query("SELECT id, public_id, username FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(UserSummary {
            id: row.try_get("id")?,
            public_id: row.try_get("public_id")?,
            username: row.try_get("username")?,
        }))
    }
}
