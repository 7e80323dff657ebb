//! nid-server binary: wire up storage, build the router, serve.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{error, info};

use nid_server::store::{sql, StoreProvider};
use nid_server::{build_router, AppState};

/// How often a degraded provider re-checks the durable backend.
const REPROBE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "nid-server", about = "Network inventory dashboard backend")]
struct Args {
    /// Port to listen on
    #[arg(long, env = "NID_PORT", default_value_t = 3000)]
    port: u16,

    /// SQLite database path
    #[arg(long, env = "NID_DATABASE", default_value = "nid.db")]
    database: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!(
        "Starting nid-server v{} (port {}, database {})",
        env!("CARGO_PKG_VERSION"),
        args.port,
        args.database
    );

    // A failed durable-backend startup is not fatal: the server comes up on
    // the in-memory fallback and the re-probe task keeps trying.
    let store = match init_durable(&args.database).await {
        Ok(pool) => {
            info!("connected to sqlite database");
            StoreProvider::durable(pool)
        }
        Err(e) => {
            error!("sqlite unavailable at startup, serving from memory: {e}");
            StoreProvider::memory_only()
        }
    };

    let reprobe_store = store.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REPROBE_INTERVAL);
        loop {
            interval.tick().await;
            reprobe_store.reprobe().await;
        }
    });

    let state = AppState::new(store.clone());
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!("nid-server listening on http://0.0.0.0:{}", args.port);
    axum::serve(listener, app).await?;

    store.close().await;
    Ok(())
}

async fn init_durable(database: &str) -> Result<sqlx::SqlitePool> {
    let options = SqliteConnectOptions::from_str(database)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    sql::init_schema(&pool).await?;
    Ok(pool)
}
