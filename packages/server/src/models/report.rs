use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use common::Severity;

/// Aggregated vulnerability report for a completed scan.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub project_id: Uuid,
    pub project_name: String,
    pub scan_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub vulnerabilities: Vec<ReportVulnerability>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub total: u64,
    pub by_severity: SeverityCounts,
    pub files_affected: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeverityCounts {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportVulnerability {
    pub rule_id: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: Severity,
    pub file_path: String,
    /// Non-blank line count of the affected file, when the file row still
    /// exists.
    pub loc: Option<i32>,
    pub line_start: i32,
    pub line_end: i32,
    pub code_snippet: Option<String>,
    pub weakness: Option<WeaknessDetails>,
    pub suggested_fix: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeaknessDetails {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub url: String,
}
