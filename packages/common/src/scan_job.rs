use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A scan request message sent to the worker queue.
///
/// IDs travel as strings on the wire; [`ScanJob::validate`] parses them at
/// the consumer boundary before anything reaches the orchestrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScanJob {
    pub project_id: String,
    pub scan_id: String,
}

/// A validated scan request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    pub project_id: Uuid,
    pub scan_id: Uuid,
}

/// Error when a scan job carries malformed IDs.
#[derive(Debug, Error)]
pub enum InvalidScanJob {
    #[error("invalid project id '{0}'")]
    ProjectId(String),

    #[error("invalid scan id '{0}'")]
    ScanId(String),
}

impl ScanJob {
    pub fn new(project_id: Uuid, scan_id: Uuid) -> Self {
        Self {
            project_id: project_id.to_string(),
            scan_id: scan_id.to_string(),
        }
    }

    /// Parse the wire IDs into a typed request.
    pub fn validate(&self) -> Result<ScanRequest, InvalidScanJob> {
        let project_id = Uuid::parse_str(&self.project_id)
            .map_err(|_| InvalidScanJob::ProjectId(self.project_id.clone()))?;
        let scan_id = Uuid::parse_str(&self.scan_id)
            .map_err(|_| InvalidScanJob::ScanId(self.scan_id.clone()))?;
        Ok(ScanRequest {
            project_id,
            scan_id,
        })
    }
}
