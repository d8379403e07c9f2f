//! Message search behind a pluggable index.

use std::future::Future;

use backchannel_database::{MessageRepository, StoredMessage};
use sqlx::SqlitePool;

use crate::types::ChatResult;

/// Finds messages in a room matching every term.
///
/// Implementations return matches newest first together with the total
/// number of matches. Only plaintext rows are searchable.
pub trait SearchIndex: Send + Sync {
    fn search(
        &self,
        room_id: i64,
        terms: &[String],
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = ChatResult<(Vec<StoredMessage>, i64)>> + Send;
}

/// Substring search over the `messages` table.
#[derive(Clone)]
pub struct SqliteSearchIndex {
    messages: MessageRepository,
}

impl SqliteSearchIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            messages: MessageRepository::new(pool),
        }
    }
}

impl SearchIndex for SqliteSearchIndex {
    async fn search(
        &self,
        room_id: i64,
        terms: &[String],
        limit: i64,
        offset: i64,
    ) -> ChatResult<(Vec<StoredMessage>, i64)> {
        Ok(self
            .messages
            .search_plaintext(room_id, terms, limit, offset)
            .await?)
    }
}
