use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use uuid::Uuid;

use mq::{MqConfig, ScanJobPublisher, init_mq};
use server::config::AppConfig;
use server::database::init_db;
use server::models::CreateProjectRequest;
use server::seed::{ensure_indexes, seed_weaknesses};
use server::services::enrichment::{FixEnricher, HttpFixBackend};
use server::services::fetcher::SourceFetcher;
use server::services::project::ProjectService;
use server::services::report::ReportService;
use server::services::scan::ScanService;

use common::storage::filesystem::FilesystemObjectStore;

#[derive(Parser)]
#[command(name = "vulnscan", about = "Source repository vulnerability scanner")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register a project, ingest its repository, and start the first scan
    CreateProject {
        #[arg(long)]
        name: String,
        #[arg(long)]
        repo_url: String,
    },
    /// List registered projects
    ListProjects,
    /// Delete a project and all of its scans, findings, and stored files
    DeleteProject { project_id: Uuid },
    /// Request a new scan of a project
    Scan { project_id: Uuid },
    /// List scans for a project
    Scans { project_id: Uuid },
    /// Build the vulnerability report for a completed scan
    Report { project_id: Uuid, scan_id: Uuid },
    /// Seed the weakness catalog and ensure indexes
    Seed,
    /// Fill in missing generic fixes via the suggestion backend
    Enrich,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let cli = Cli::parse();
    let config = AppConfig::load().context("Failed to load config")?;

    let db = init_db(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Command::CreateProject { name, repo_url } => {
            let service = project_service(&config, db.clone()).await?;
            let (project, scan) = service
                .create(CreateProjectRequest { name, repo_url })
                .await?;
            println!("{}", serde_json::to_string_pretty(&project)?);
            println!("{}", serde_json::to_string_pretty(&scan)?);
        }
        Command::ListProjects => {
            let service = project_service(&config, db.clone()).await?;
            let projects = service.list().await?;
            println!("{}", serde_json::to_string_pretty(&projects)?);
        }
        Command::DeleteProject { project_id } => {
            let service = project_service(&config, db.clone()).await?;
            service.delete(project_id).await?;
            println!("Deleted project {project_id}");
        }
        Command::Scan { project_id } => {
            let service = ScanService::new(db.clone(), queue(&config).await?);
            let scan = service.create_scan_request(project_id).await?;
            println!("{}", serde_json::to_string_pretty(&scan)?);
        }
        Command::Scans { project_id } => {
            let service = ScanService::new(db.clone(), queue(&config).await?);
            let scans = service.list(project_id).await?;
            println!("{}", serde_json::to_string_pretty(&scans)?);
        }
        Command::Report {
            project_id,
            scan_id,
        } => {
            let enricher = enricher(&config)?;
            let service = ReportService::new(db.clone(), enricher);
            let report = service.build_report(project_id, scan_id).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Seed => {
            seed_weaknesses(&db).await?;
            ensure_indexes(&db).await?;
            println!("Seed complete");
        }
        Command::Enrich => {
            let enricher = enricher(&config)?;
            let stats = enricher.populate_generic_fixes(&db).await?;
            println!(
                "Enrichment finished: {} examined, {} updated, {} failed",
                stats.examined, stats.updated, stats.failed
            );
        }
    }

    Ok(())
}

async fn queue(config: &AppConfig) -> anyhow::Result<Arc<ScanJobPublisher>> {
    let mq = init_mq(MqConfig {
        url: config.mq.url.clone(),
        pool_size: config.mq.pool_size,
    })
    .await
    .context("Failed to initialize MQ")?;
    Ok(Arc::new(ScanJobPublisher::new(
        Arc::new(mq),
        config.mq.queue_name.clone(),
    )))
}

async fn project_service(
    config: &AppConfig,
    db: sea_orm::DatabaseConnection,
) -> anyhow::Result<ProjectService> {
    let store = Arc::new(
        FilesystemObjectStore::new(
            config.storage.root.clone().into(),
            config.storage.max_file_size,
        )
        .await
        .context("Failed to open object store")?,
    );
    let fetcher = Arc::new(SourceFetcher::new(config.fetcher.clone()));
    Ok(ProjectService::new(
        db,
        store,
        fetcher,
        queue(config).await?,
    ))
}

fn enricher(config: &AppConfig) -> anyhow::Result<Arc<FixEnricher>> {
    let backend = Arc::new(HttpFixBackend::new(&config.enrichment)?);
    Ok(Arc::new(FixEnricher::new(
        backend,
        config.enrichment.clone(),
    )))
}
