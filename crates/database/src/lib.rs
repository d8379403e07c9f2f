//! Backchannel Database Crate
//!
//! Connection management, migrations, and the room, membership and message
//! repositories used by the chat services.

use backchannel_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;
pub mod util;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::prepare_database;
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{MemberRepository, MessageRepository, RoomRepository, UserRepository};

pub use entities::{
    NewMessage, NewRoom, Room, RoomMember, RoomVisibility, StoredMessage, UserSummary,
};

pub use types::{DatabaseError, DatabaseResult, Page, PageRequest, MAX_PAGE_SIZE};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}
