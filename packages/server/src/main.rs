use anyhow::Context;
use tracing::info;

use server::config::AppConfig;
use server::database::init_db;
use server::seed::{ensure_indexes, seed_weaknesses};
use server::sweeper::run_stuck_scan_sweeper;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connected and schema synced");

    seed_weaknesses(&db).await.context("Failed to seed weakness catalog")?;
    ensure_indexes(&db).await.context("Failed to ensure indexes")?;

    let sweeper_handle = tokio::spawn(run_stuck_scan_sweeper(db.clone(), config.sweeper.clone()));
    info!("Server started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    sweeper_handle.abort();

    Ok(())
}
