use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use common::entity::{finding, scan, source_file, weakness};
use common::storage::ObjectStore;
use common::{ScanJob, ScanRequest, ScanStatus};
use mq::BroccoliError;

use crate::error::WorkerError;
use crate::models::analyzer::{Analyzer, NormalizedFinding};

/// Everything one scan run needs, injected so tests can swap the analyzer
/// and storage.
pub struct ScanContext {
    pub db: DatabaseConnection,
    pub store: Arc<dyn ObjectStore>,
    pub analyzer: Arc<dyn Analyzer>,
}

/// Entry point for one queue message.
///
/// Returns `Err` only for failures worth redelivering (infrastructure
/// problems before any per-file work starts). Malformed jobs and unknown
/// scans are logged and dropped so they cannot loop forever.
pub async fn process_scan_job(ctx: &ScanContext, job: ScanJob) -> Result<(), BroccoliError> {
    let request = match job.validate() {
        Ok(request) => request,
        Err(e) => {
            error!(
                project_id = %job.project_id,
                scan_id = %job.scan_id,
                error = %e,
                "Dropping malformed scan job"
            );
            return Ok(());
        }
    };

    run_scan(ctx, request).await
}

async fn run_scan(ctx: &ScanContext, request: ScanRequest) -> Result<(), BroccoliError> {
    let ScanRequest {
        project_id,
        scan_id,
    } = request;

    let scan_row = scan::Entity::find_by_id(scan_id)
        .one(&ctx.db)
        .await
        .map_err(|e| BroccoliError::Job(format!("Failed to load scan: {e}")))?;

    let Some(scan_row) = scan_row else {
        warn!(%scan_id, "Scan not found, dropping job");
        return Ok(());
    };

    if scan_row.status.is_terminal() {
        info!(%scan_id, status = %scan_row.status, "Scan already finished, skipping");
        return Ok(());
    }

    let files = source_file::Entity::find()
        .filter(source_file::Column::ProjectId.eq(project_id))
        .all(&ctx.db)
        .await
        .map_err(|e| BroccoliError::Job(format!("Failed to load files: {e}")))?;

    if files.is_empty() {
        warn!(%project_id, %scan_id, "No files found for project");
        update_status(
            &ctx.db,
            scan_id,
            ScanStatus::Failed,
            Some("No files found".into()),
            None,
        )
        .await;
        return Ok(());
    }

    // Known catalog ids, so a finding never references a missing weakness.
    let known_weaknesses: HashSet<i32> = weakness::Entity::find()
        .select_only()
        .column(weakness::Column::Id)
        .into_tuple()
        .all(&ctx.db)
        .await
        .map_err(|e| BroccoliError::Job(format!("Failed to load weakness catalog: {e}")))?
        .into_iter()
        .collect();

    update_status(&ctx.db, scan_id, ScanStatus::InProgress, None, None).await;
    info!(%project_id, %scan_id, files = files.len(), "Scan started");

    let started = Instant::now();
    let mut files_processed = 0i32;
    let mut total_vulns = 0i32;

    for file in &files {
        // Every file counts as processed, even ones that fail; the scan
        // itself keeps going.
        files_processed += 1;

        match scan_one_file(ctx, project_id, file, &known_weaknesses).await {
            Ok(findings) => match persist_findings(ctx, scan_id, file.id, findings).await {
                Ok(count) => total_vulns += count,
                Err(e) => {
                    error!(file = %file.file_path, error = %e, "Failed to persist findings");
                }
            },
            Err(e) => {
                warn!(file = %file.file_path, error = %e, "Skipping file after scan failure");
            }
        }
    }

    let duration_secs = (started.elapsed().as_secs_f64() * 100.0).round() / 100.0;

    update_status(
        &ctx.db,
        scan_id,
        ScanStatus::Completed,
        None,
        Some(ScanStats {
            scanned_files_count: files_processed,
            total_vuln_count: total_vulns,
            duration_secs,
        }),
    )
    .await;

    info!(
        %scan_id,
        files_processed,
        total_vulns,
        duration_secs,
        "Scan completed"
    );
    Ok(())
}

/// Download one file from blob storage and run the analyzer over it.
async fn scan_one_file(
    ctx: &ScanContext,
    project_id: Uuid,
    file: &source_file::Model,
    known_weaknesses: &HashSet<i32>,
) -> Result<Vec<NormalizedFinding>, WorkerError> {
    let key = format!("{project_id}/{}", file.file_path);
    let content = ctx.store.get(&key).await?;

    // The analyzer needs a real file; keep the original basename so its
    // report refers to something recognizable.
    let work_dir = tempfile::tempdir()?;
    let basename = file
        .file_path
        .rsplit('/')
        .next()
        .unwrap_or(file.file_path.as_str());
    let local_path = work_dir.path().join(basename);
    tokio::fs::write(&local_path, &content).await?;

    let raw = ctx.analyzer.analyze(&local_path).await?;

    let findings = raw
        .into_iter()
        .filter_map(|r| r.normalize())
        .map(|mut f| {
            if let Some(id) = f.weakness_id
                && !known_weaknesses.contains(&id)
            {
                warn!(file = %file.file_path, cwe = id, "Unknown weakness id, storing unmapped");
                f.weakness_id = None;
            }
            f
        })
        .collect();

    Ok(findings)
}

/// Insert all findings for one file in a single transaction.
async fn persist_findings(
    ctx: &ScanContext,
    scan_id: Uuid,
    file_id: Uuid,
    findings: Vec<NormalizedFinding>,
) -> Result<i32, WorkerError> {
    if findings.is_empty() {
        return Ok(0);
    }

    let count = findings.len() as i32;
    let models: Vec<finding::ActiveModel> = findings
        .into_iter()
        .map(|f| finding::ActiveModel {
            id: Set(Uuid::new_v4()),
            rule_id: Set(f.rule_id),
            description: Set(f.description),
            severity: Set(f.severity),
            confidence: Set(f.confidence),
            line_start: Set(f.line_start),
            line_end: Set(f.line_end),
            code_snippet: Set(f.code_snippet),
            scan_id: Set(scan_id),
            file_id: Set(file_id),
            weakness_id: Set(f.weakness_id),
            created_at: Set(Utc::now()),
        })
        .collect();

    let txn = ctx.db.begin().await?;
    finding::Entity::insert_many(models).exec(&txn).await?;
    txn.commit().await?;

    Ok(count)
}

struct ScanStats {
    scanned_files_count: i32,
    total_vuln_count: i32,
    duration_secs: f64,
}

/// Best-effort status update; a failed write is logged, never fatal.
async fn update_status(
    db: &DatabaseConnection,
    scan_id: Uuid,
    status: ScanStatus,
    message: Option<String>,
    stats: Option<ScanStats>,
) {
    let mut model = scan::ActiveModel {
        id: Set(scan_id),
        status: Set(status),
        status_message: Set(message),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };

    if let Some(stats) = stats {
        model.scanned_files_count = Set(Some(stats.scanned_files_count));
        model.total_vuln_count = Set(Some(stats.total_vuln_count));
        model.duration_secs = Set(Some(stats.duration_secs));
    }

    if let Err(e) = model.update(db).await {
        error!(%scan_id, status = %status, error = %e, "Failed to update scan status");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::analyzer::{AnalyzerError, RawCwe, RawFinding};
    use async_trait::async_trait;
    use common::Severity;
    use common::storage::filesystem::FilesystemObjectStore;
    use sea_orm::Database;
    use std::collections::HashMap;
    use std::path::Path;

    async fn test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.get_schema_registry("common::entity::*")
            .sync(&db)
            .await
            .unwrap();
        db
    }

    /// Analyzer fake keyed by file basename.
    #[derive(Default)]
    struct ScriptedAnalyzer {
        results: HashMap<String, Vec<RawFinding>>,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl Analyzer for ScriptedAnalyzer {
        async fn analyze(&self, path: &Path) -> Result<Vec<RawFinding>, AnalyzerError> {
            let name = path.file_name().unwrap().to_str().unwrap().to_string();
            if self.failing.contains(&name) {
                return Err(AnalyzerError::Failed {
                    status: 2,
                    stderr: "scripted failure".into(),
                });
            }
            Ok(self.results.get(&name).cloned().unwrap_or_default())
        }
    }

    fn high_finding(cwe: Option<i64>) -> RawFinding {
        RawFinding {
            test_id: Some("B602".into()),
            issue_text: Some("subprocess call with shell=True identified".into()),
            issue_severity: Some("HIGH".into()),
            issue_confidence: Some("HIGH".into()),
            line_range: vec![10],
            code: Some("subprocess.call(cmd, shell=True)".into()),
            issue_cwe: cwe.map(|id| RawCwe { id: Some(id) }),
        }
    }

    struct Fixture {
        ctx: ScanContext,
        project_id: Uuid,
        scan_id: Uuid,
        _dir: tempfile::TempDir,
    }

    async fn fixture(analyzer: ScriptedAnalyzer, files: &[(&str, &str)]) -> Fixture {
        let db = test_db().await;
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            FilesystemObjectStore::new(dir.path().join("blobs"), 10 * 1024 * 1024)
                .await
                .unwrap(),
        );

        let project_id = Uuid::new_v4();
        let scan_id = Uuid::new_v4();
        let now = Utc::now();

        common::entity::project::ActiveModel {
            id: Set(project_id),
            name: Set("worker-test".into()),
            repo_url: Set("https://example.com/r.git".into()),
            file_count: Set(Some(files.len() as i32)),
            created_at: Set(now),
        }
        .insert(&db)
        .await
        .unwrap();

        for (path, content) in files {
            store
                .put(&format!("{project_id}/{path}"), content.as_bytes())
                .await
                .unwrap();
            source_file::ActiveModel {
                id: Set(Uuid::new_v4()),
                file_path: Set(path.to_string()),
                loc: Set(content.lines().count() as i32),
                project_id: Set(project_id),
                created_at: Set(now),
            }
            .insert(&db)
            .await
            .unwrap();
        }

        weakness::ActiveModel {
            id: Set(78),
            name: Set("OS Command Injection".into()),
            description: Set("Shell metacharacters".into()),
            url: Set("https://cwe.mitre.org/data/definitions/78.html".into()),
            generic_fix: Set(None),
            created_at: Set(now),
        }
        .insert(&db)
        .await
        .unwrap();

        scan::ActiveModel {
            id: Set(scan_id),
            status: Set(ScanStatus::Pending),
            status_message: Set(None),
            scanned_files_count: Set(None),
            total_vuln_count: Set(None),
            duration_secs: Set(None),
            project_id: Set(project_id),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&db)
        .await
        .unwrap();

        Fixture {
            ctx: ScanContext {
                db,
                store,
                analyzer: Arc::new(analyzer),
            },
            project_id,
            scan_id,
            _dir: dir,
        }
    }

    async fn scan_row(fx: &Fixture) -> scan::Model {
        scan::Entity::find_by_id(fx.scan_id)
            .one(&fx.ctx.db)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn two_files_one_finding_completes_with_stats() {
        let mut analyzer = ScriptedAnalyzer::default();
        analyzer
            .results
            .insert("app.py".into(), vec![high_finding(Some(78))]);

        let fx = fixture(
            analyzer,
            &[("app.py", "import subprocess\n"), ("lib/util.py", "x = 1\n")],
        )
        .await;

        process_scan_job(&fx.ctx, ScanJob::new(fx.project_id, fx.scan_id))
            .await
            .unwrap();

        let row = scan_row(&fx).await;
        assert_eq!(row.status, ScanStatus::Completed);
        assert_eq!(row.scanned_files_count, Some(2));
        assert_eq!(row.total_vuln_count, Some(1));
        assert!(row.duration_secs.is_some());

        let findings = finding::Entity::find().all(&fx.ctx.db).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "B602");
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].weakness_id, Some(78));
        assert_eq!(findings[0].scan_id, fx.scan_id);
    }

    #[tokio::test]
    async fn analyzer_failure_on_one_file_still_counts_it() {
        let mut analyzer = ScriptedAnalyzer::default();
        analyzer
            .results
            .insert("good.py".into(), vec![high_finding(Some(78))]);
        analyzer.failing.insert("bad.py".into());

        let fx = fixture(analyzer, &[("good.py", "a\n"), ("bad.py", "b\n")]).await;

        process_scan_job(&fx.ctx, ScanJob::new(fx.project_id, fx.scan_id))
            .await
            .unwrap();

        let row = scan_row(&fx).await;
        assert_eq!(row.status, ScanStatus::Completed);
        assert_eq!(row.scanned_files_count, Some(2));
        assert_eq!(row.total_vuln_count, Some(1));
    }

    #[tokio::test]
    async fn missing_blob_still_counts_file() {
        let fx = fixture(ScriptedAnalyzer::default(), &[("app.py", "x\n")]).await;

        // A file row with no blob behind it.
        source_file::ActiveModel {
            id: Set(Uuid::new_v4()),
            file_path: Set("ghost.py".into()),
            loc: Set(1),
            project_id: Set(fx.project_id),
            created_at: Set(Utc::now()),
        }
        .insert(&fx.ctx.db)
        .await
        .unwrap();

        process_scan_job(&fx.ctx, ScanJob::new(fx.project_id, fx.scan_id))
            .await
            .unwrap();

        let row = scan_row(&fx).await;
        assert_eq!(row.status, ScanStatus::Completed);
        assert_eq!(row.scanned_files_count, Some(2));
        assert_eq!(row.total_vuln_count, Some(0));
    }

    #[tokio::test]
    async fn project_without_files_fails_the_scan() {
        let fx = fixture(ScriptedAnalyzer::default(), &[]).await;

        process_scan_job(&fx.ctx, ScanJob::new(fx.project_id, fx.scan_id))
            .await
            .unwrap();

        let row = scan_row(&fx).await;
        assert_eq!(row.status, ScanStatus::Failed);
        assert_eq!(row.status_message.as_deref(), Some("No files found"));
        assert!(row.scanned_files_count.is_none());
    }

    #[tokio::test]
    async fn malformed_job_is_dropped_without_redelivery() {
        let fx = fixture(ScriptedAnalyzer::default(), &[("app.py", "x\n")]).await;

        let job = ScanJob {
            project_id: "not-a-uuid".into(),
            scan_id: fx.scan_id.to_string(),
        };
        assert!(process_scan_job(&fx.ctx, job).await.is_ok());

        // Nothing happened to the scan.
        assert_eq!(scan_row(&fx).await.status, ScanStatus::Pending);
    }

    #[tokio::test]
    async fn unknown_scan_is_dropped() {
        let fx = fixture(ScriptedAnalyzer::default(), &[("app.py", "x\n")]).await;
        let job = ScanJob::new(fx.project_id, Uuid::new_v4());
        assert!(process_scan_job(&fx.ctx, job).await.is_ok());
    }

    #[tokio::test]
    async fn terminal_scan_is_not_reprocessed() {
        let mut analyzer = ScriptedAnalyzer::default();
        analyzer
            .results
            .insert("app.py".into(), vec![high_finding(Some(78))]);
        let fx = fixture(analyzer, &[("app.py", "x\n")]).await;

        let mut done: scan::ActiveModel = scan_row(&fx).await.into();
        done.status = Set(ScanStatus::Completed);
        done.update(&fx.ctx.db).await.unwrap();

        process_scan_job(&fx.ctx, ScanJob::new(fx.project_id, fx.scan_id))
            .await
            .unwrap();

        assert!(finding::Entity::find().all(&fx.ctx.db).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_weakness_id_is_stored_unmapped() {
        let mut analyzer = ScriptedAnalyzer::default();
        analyzer
            .results
            .insert("app.py".into(), vec![high_finding(Some(9999))]);
        let fx = fixture(analyzer, &[("app.py", "x\n")]).await;

        process_scan_job(&fx.ctx, ScanJob::new(fx.project_id, fx.scan_id))
            .await
            .unwrap();

        let findings = finding::Entity::find().all(&fx.ctx.db).await.unwrap();
        assert_eq!(findings.len(), 1);
        assert!(findings[0].weakness_id.is_none());
    }
}
