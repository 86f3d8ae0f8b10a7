use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use common::entity::scan;

#[derive(Debug, Clone, Serialize)]
pub struct ScanResponse {
    pub id: Uuid,
    pub project_id: Uuid,
    /// Human-readable status label ("Pending", "In Progress", ...).
    pub status: String,
    /// Numeric wire code for the status.
    pub status_code: i16,
    pub status_message: Option<String>,
    pub scanned_files_count: Option<i32>,
    pub total_vuln_count: Option<i32>,
    pub duration_secs: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<scan::Model> for ScanResponse {
    fn from(model: scan::Model) -> Self {
        Self {
            id: model.id,
            project_id: model.project_id,
            status: model.status.label().to_string(),
            status_code: model.status.code(),
            status_message: model.status_message,
            scanned_files_count: model.scanned_files_count,
            total_vuln_count: model.total_vuln_count,
            duration_secs: model.duration_secs,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}
