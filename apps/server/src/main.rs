use std::time::Duration;

use anyhow::Context;
use backchannel_api::build_router;
use backchannel_config::load as load_config;
use backchannel_runtime::{telemetry, BackendServices};
use clap::{Parser, Subcommand};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "backchannel")]
#[command(about = "Backchannel real-time messaging backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server (default)
    Serve,
    /// Delete expired refresh tokens once and exit
    SweepTokens,
    /// Print every room with its member and message counts
    DumpRooms,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SweepTokens => sweep_tokens().await,
        Commands::DumpRooms => dump_rooms().await,
    }
}

async fn initialise() -> anyhow::Result<(backchannel_config::AppConfig, BackendServices)> {
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;
    Ok((config, services))
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Backchannel backend");

    let (config, services) = initialise().await?;

    let sweeper =
        services.spawn_token_sweeper(Duration::from_secs(config.auth.sweep_interval_seconds));
    let app = build_router(services.app_state());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(backchannel_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    sweeper.abort();
    info!("backend shut down");
    Ok(())
}

async fn sweep_tokens() -> anyhow::Result<()> {
    let (_, services) = initialise().await?;

    let deleted = services
        .authenticator
        .sweep_expired_tokens()
        .await
        .context("failed to sweep refresh tokens")?;

    println!("Deleted {deleted} expired refresh tokens");
    Ok(())
}

async fn dump_rooms() -> anyhow::Result<()> {
    let (_, services) = initialise().await?;

    let rooms = sqlx::query(
        r#"
        SELECT r.public_id, r.name, r.visibility, r.created_at,
               (SELECT COUNT(*) FROM room_members m WHERE m.room_id = r.id) AS members,
               (SELECT COUNT(*) FROM messages g WHERE g.room_id = r.id) AS messages
        FROM rooms r
        ORDER BY r.created_at ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch rooms")?;

    if rooms.is_empty() {
        println!("No rooms found in database");
        return Ok(());
    }

    println!("Found {} rooms:", rooms.len());
    println!(
        "{:<26} {:<30} {:<10} {:<8} {:<9} {:<28}",
        "Public ID", "Name", "Visibility", "Members", "Messages", "Created At"
    );
    println!("{}", "-".repeat(115));

    for room in rooms {
        let public_id: String = room.try_get("public_id")?;
        let name: String = room.try_get("name")?;
        let visibility: String = room.try_get("visibility")?;
        let members: i64 = room.try_get("members")?;
        let messages: i64 = room.try_get("messages")?;
        let created_at: String = room.try_get("created_at")?;

        println!(
            "{:<26} {:<30} {:<10} {:<8} {:<9} {:<28}",
            public_id, name, visibility, members, messages, created_at
        );
    }

    Ok(())
}
