mod config;
mod error;
mod handlers;
mod models;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sea_orm::{ConnectOptions, Database};
use tracing::{error, info};

use common::ScanJob;
use common::storage::filesystem::FilesystemObjectStore;
use handlers::scan::{ScanContext, process_scan_job};
use models::bandit::BanditAnalyzer;
use mq::{BrokerMessage, MqConfig, init_mq};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let config = config::WorkerAppConfig::load().context("Failed to load config")?;
    info!("Worker starting: {}", config.worker.id);

    let mut opt = ConnectOptions::new(config.database.url.clone());
    opt.max_connections(10).sqlx_logging(false);
    let db = Database::connect(opt)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(
        FilesystemObjectStore::new(
            PathBuf::from(&config.storage.root),
            config.storage.max_file_size,
        )
        .await
        .context("Failed to open object store")?,
    );

    let analyzer = Arc::new(BanditAnalyzer::new(
        config.worker.analyzer_bin.clone(),
        Duration::from_secs(config.worker.analyzer_timeout_secs),
    ));

    let mq = init_mq(MqConfig {
        url: config.mq.url.clone(),
        pool_size: config.mq.pool_size,
    })
    .await
    .context("Failed to initialize MQ")?;

    info!(queue_name = %config.mq.queue_name, "MQ connected");

    let ctx = Arc::new(ScanContext {
        db,
        store,
        analyzer,
    });

    // Files are scanned sequentially within a job, and jobs are consumed
    // one at a time; parallelism comes from running more worker processes.
    let result = mq
        .process_messages(
            &config.mq.queue_name,
            None,
            None,
            move |message: BrokerMessage<ScanJob>| {
                let ctx = Arc::clone(&ctx);
                async move { process_scan_job(&ctx, message.payload).await }
            },
        )
        .await;

    if let Err(e) = result {
        error!(error = %e, "Worker stopped unexpectedly");
    }

    Ok(())
}
