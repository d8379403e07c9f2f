use std::time::Duration;

use anyhow::{Context, Result};
use backchannel_api::AppState;
use backchannel_auth::Authenticator;
use backchannel_chats::{Broadcaster, EncryptionCodec, MessagePipeline, RoomManager};
use backchannel_config::{AppConfig, EncryptionConfig};
use backchannel_database::initialize_database;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::DEBUG)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub authenticator: Authenticator,
    pub broadcaster: Broadcaster,
    pub rooms: RoomManager,
    pub messages: MessagePipeline,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to prepare database")?;

        let authenticator = Authenticator::new(db_pool.clone(), &config.auth);
        let codec = encryption_codec(&config.encryption)?;
        let broadcaster = Broadcaster::new(config.realtime.channel_capacity);
        let rooms = RoomManager::new(db_pool.clone(), broadcaster.clone());
        let messages =
            MessagePipeline::new(db_pool.clone(), rooms.clone(), codec, broadcaster.clone());

        info!(
            database = %config.database.url,
            channel_capacity = config.realtime.channel_capacity,
            "backend services ready"
        );

        Ok(Self {
            db_pool,
            authenticator,
            broadcaster,
            rooms,
            messages,
        })
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.authenticator.clone(),
            self.rooms.clone(),
            self.messages.clone(),
            self.broadcaster.clone(),
        )
    }

    /// Periodically deletes expired refresh tokens until the task is aborted.
    pub fn spawn_token_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let authenticator = self.authenticator.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = authenticator.sweep_expired_tokens().await {
                    warn!(%error, "refresh token sweep failed");
                }
            }
        })
    }
}

fn encryption_codec(config: &EncryptionConfig) -> Result<EncryptionCodec> {
    match config.key.as_deref().filter(|key| !key.trim().is_empty()) {
        Some(key) => EncryptionCodec::from_base64_key(key)
            .context("encryption.key must be 32 bytes encoded as base64"),
        None => {
            warn!("encryption.key is not configured, encrypted messages will not survive a restart");
            Ok(EncryptionCodec::generate())
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
