//! Temp-file database fixtures for repository tests

use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::util::{new_public_id, now_timestamp};
use crate::initialize_database;
use backchannel_config::DatabaseConfig;

pub(crate) struct TestDb {
    pub pool: SqlitePool,
    _temp_dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("repo.db").display()),
            max_connections: 4,
        };
        let pool = initialize_database(&config).await.unwrap();
        Self {
            pool,
            _temp_dir: temp_dir,
        }
    }

    pub async fn insert_user(&self, username: &str) -> i64 {
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
