use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{error, info};
use uuid::Uuid;

use common::entity::{project, scan};
use common::mq::ScanJobQueue;
use common::{ScanJob, ScanStatus};

use crate::error::AppError;
use crate::models::ScanResponse;

/// Creates scan requests and hands them to the worker queue.
pub struct ScanService {
    db: DatabaseConnection,
    queue: Arc<dyn ScanJobQueue>,
}

impl ScanService {
    pub fn new(db: DatabaseConnection, queue: Arc<dyn ScanJobQueue>) -> Self {
        Self { db, queue }
    }

    /// Create a Pending scan for the project and publish a job for it.
    ///
    /// If the publish fails the scan row is marked Failed so it never sits
    /// in Pending forever waiting for a job that was never sent.
    pub async fn create_scan_request(&self, project_id: Uuid) -> Result<ScanResponse, AppError> {
        let exists = project::Entity::find_by_id(project_id).one(&self.db).await?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("Project {project_id} not found")));
        }

        let scan_id = Uuid::new_v4();
        let now = Utc::now();
        let model = scan::ActiveModel {
            id: Set(scan_id),
            status: Set(ScanStatus::Pending),
            status_message: Set(None),
            scanned_files_count: Set(None),
            total_vuln_count: Set(None),
            duration_secs: Set(None),
            project_id: Set(project_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model.insert(&self.db).await?;

        if let Err(e) = self.queue.enqueue(ScanJob::new(project_id, scan_id)).await {
            error!(%scan_id, error = %e, "Failed to enqueue scan job");

            let mut failed: scan::ActiveModel = inserted.into();
            failed.status = Set(ScanStatus::Failed);
            failed.status_message = Set(Some("Failed to enqueue scan job".into()));
            failed.updated_at = Set(Utc::now());
            failed.update(&self.db).await?;

            return Err(AppError::Internal(format!(
                "failed to enqueue scan job: {e}"
            )));
        }

        info!(%project_id, %scan_id, "Created scan request");
        Ok(inserted.into())
    }

    pub async fn get(&self, scan_id: Uuid) -> Result<ScanResponse, AppError> {
        scan::Entity::find_by_id(scan_id)
            .one(&self.db)
            .await?
            .map(ScanResponse::from)
            .ok_or_else(|| AppError::NotFound(format!("Scan {scan_id} not found")))
    }

    /// All scans for a project, newest first.
    pub async fn list(&self, project_id: Uuid) -> Result<Vec<ScanResponse>, AppError> {
        let scans = scan::Entity::find()
            .filter(scan::Column::ProjectId.eq(project_id))
            .order_by_desc(scan::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(scans.into_iter().map(ScanResponse::from).collect())
    }
}
