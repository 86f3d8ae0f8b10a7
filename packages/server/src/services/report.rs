use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tracing::info;
use uuid::Uuid;

use common::entity::{finding, project, scan, source_file, weakness};

use crate::error::AppError;
use crate::models::{Report, ReportSummary, ReportVulnerability, SeverityCounts, WeaknessDetails};
use crate::services::enrichment::{FixEnricher, finding_prompt};

/// Builds the aggregated report for one scan.
///
/// Pure read-plus-enrich: nothing here writes to the database.
pub struct ReportService {
    db: DatabaseConnection,
    enricher: Arc<FixEnricher>,
}

impl ReportService {
    pub fn new(db: DatabaseConnection, enricher: Arc<FixEnricher>) -> Self {
        Self { db, enricher }
    }

    pub async fn build_report(&self, project_id: Uuid, scan_id: Uuid) -> Result<Report, AppError> {
        // A scan under a different project reads the same as a missing one.
        let scan = scan::Entity::find_by_id(scan_id).one(&self.db).await?;
        let scan = match scan {
            Some(s) if s.project_id == project_id => s,
            _ => {
                return Err(AppError::NotFound(
                    "Scan not found for this project".into(),
                ));
            }
        };

        let proj = project::Entity::find_by_id(project_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))?;

        let mut findings = finding::Entity::find()
            .filter(finding::Column::ScanId.eq(scan.id))
            .all(&self.db)
            .await?;

        let file_ids: Vec<Uuid> = findings
            .iter()
            .map(|f| f.file_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let files: HashMap<Uuid, source_file::Model> = if file_ids.is_empty() {
            HashMap::new()
        } else {
            source_file::Entity::find()
                .filter(source_file::Column::Id.is_in(file_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|f| (f.id, f))
                .collect()
        };

        let weakness_ids: Vec<i32> = findings
            .iter()
            .filter_map(|f| f.weakness_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let weaknesses: HashMap<i32, weakness::Model> = if weakness_ids.is_empty() {
            HashMap::new()
        } else {
            weakness::Entity::find()
                .filter(weakness::Column::Id.is_in(weakness_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|w| (w.id, w))
                .collect()
        };

        // Stable report ordering regardless of insertion order.
        findings.sort_by(|a, b| {
            let path_a = files.get(&a.file_id).map(|f| f.file_path.as_str());
            let path_b = files.get(&b.file_id).map(|f| f.file_path.as_str());
            path_a
                .cmp(&path_b)
                .then(a.line_start.cmp(&b.line_start))
                .then(a.rule_id.cmp(&b.rule_id))
        });

        let mut summary = ReportSummary {
            total: findings.len() as u64,
            by_severity: SeverityCounts::default(),
            files_affected: findings
                .iter()
                .map(|f| f.file_id)
                .collect::<HashSet<_>>()
                .len() as u64,
        };

        let mut vulnerabilities = Vec::with_capacity(findings.len());
        for f in findings {
            summary.by_severity.record(f.severity);

            let file = files.get(&f.file_id);
            let file_path = file
                .map(|file| file.file_path.clone())
                .unwrap_or_else(|| "<unknown>".to_string());
            let loc = file.map(|file| file.loc);
            let weakness = f.weakness_id.and_then(|id| weaknesses.get(&id));

            let prompt = finding_prompt(
                &file_path,
                f.line_start,
                f.line_end,
                f.code_snippet.as_deref().unwrap_or(""),
            );
            let suggested_fix = self
                .enricher
                .suggest(&prompt, weakness.and_then(|w| w.generic_fix.as_deref()))
                .await;

            vulnerabilities.push(ReportVulnerability {
                rule_id: f.rule_id,
                description: f.description,
                severity: f.severity,
                confidence: f.confidence,
                file_path,
                loc,
                line_start: f.line_start,
                line_end: f.line_end,
                code_snippet: f.code_snippet,
                weakness: weakness.map(|w| WeaknessDetails {
                    id: w.id,
                    name: w.name.clone(),
                    description: w.description.clone(),
                    url: w.url.clone(),
                }),
                suggested_fix,
            });
        }

        info!(
            %project_id,
            %scan_id,
            total = summary.total,
            "Built scan report"
        );

        Ok(Report {
            project_id,
            project_name: proj.name,
            scan_id,
            generated_at: Utc::now(),
            summary,
            vulnerabilities,
        })
    }
}
