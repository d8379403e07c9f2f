//! Temp-file database fixtures for service tests

use backchannel_config::DatabaseConfig;
use backchannel_database::initialize_database;
use backchannel_database::util::{new_public_id, now_timestamp};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::{Broadcaster, EncryptionCodec, MessagePipeline, RoomManager};

pub(crate) struct TestContext {
    pub pool: SqlitePool,
    pub broadcaster: Broadcaster,
    pub rooms: RoomManager,
    pub pipeline: MessagePipeline,
    _temp_dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("chats.db").display()),
            max_connections: 4,
        };
        let pool = initialize_database(&config).await.unwrap();

        let broadcaster = Broadcaster::new(16);
        let rooms = RoomManager::new(pool.clone(), broadcaster.clone());
        let pipeline = MessagePipeline::new(
            pool.clone(),
            rooms.clone(),
            EncryptionCodec::generate(),
            broadcaster.clone(),
        );

        Self {
            pool,
            broadcaster,
            rooms,
            pipeline,
            _temp_dir: temp_dir,
        }
    }

    pub async fn user(&self, username: &str) -> i64 {
        let now = now_timestamp();
        sqlx::query(
            "INSERT INTO users (public_id, username, email, password_hash, created_at, updated_at) VALUES (?, ?, ?, 'x', ?, ?)",
        )
        .bind(new_public_id())
        .bind(username)
        .bind(format!("{username}@example.com"))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }
}
