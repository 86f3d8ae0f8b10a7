use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use common::entity::{finding, project, scan, source_file};
use common::mq::ScanJobQueue;
use common::storage::ObjectStore;

use crate::error::AppError;
use crate::models::{CreateProjectRequest, ProjectResponse, ScanResponse};
use crate::services::fetcher::{SourceFetcher, ingest_directory};
use crate::services::scan::ScanService;

const MAX_NAME_LEN: usize = 256;

/// Registers projects: clone, ingest, then kick off the first scan.
pub struct ProjectService {
    db: DatabaseConnection,
    store: Arc<dyn ObjectStore>,
    fetcher: Arc<SourceFetcher>,
    scans: ScanService,
}

impl ProjectService {
    pub fn new(
        db: DatabaseConnection,
        store: Arc<dyn ObjectStore>,
        fetcher: Arc<SourceFetcher>,
        queue: Arc<dyn ScanJobQueue>,
    ) -> Self {
        let scans = ScanService::new(db.clone(), queue);
        Self {
            db,
            store,
            fetcher,
            scans,
        }
    }

    /// Register a project: clone its repository, ingest the sources, and
    /// create the initial scan request.
    pub async fn create(
        &self,
        request: CreateProjectRequest,
    ) -> Result<(ProjectResponse, ScanResponse), AppError> {
        self.fetcher.validate_repo_url(&request.repo_url)?;
        let clone_dir = self.fetcher.fetch(&request.repo_url).await?;
        self.create_from_directory(request, clone_dir.path()).await
    }

    /// Ingest an already-materialized source tree.
    ///
    /// Split out from [`Self::create`] so ingestion and rollback can be
    /// exercised without a network clone.
    pub async fn create_from_directory(
        &self,
        request: CreateProjectRequest,
        source_root: &Path,
    ) -> Result<(ProjectResponse, ScanResponse), AppError> {
        let name = request.name.trim();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Project name must be 1-{MAX_NAME_LEN} characters"
            )));
        }

        let existing = project::Entity::find()
            .filter(project::Column::Name.eq(name))
            .one(&self.db)
            .await?;
        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "Project '{name}' already exists"
            )));
        }

        let project_id = Uuid::new_v4();
        let model = project::ActiveModel {
            id: Set(project_id),
            name: Set(name.to_string()),
            repo_url: Set(request.repo_url.clone()),
            file_count: Set(None),
            created_at: Set(Utc::now()),
        };
        let mut inserted = model.insert(&self.db).await?;

        let file_count =
            match ingest_directory(&self.db, self.store.as_ref(), project_id, source_root).await {
                Ok(count) => count,
                Err(e) => {
                    self.rollback_ingest(project_id).await;
                    return Err(e);
                }
            };

        let mut update: project::ActiveModel = inserted.clone().into();
        update.file_count = Set(Some(file_count));
        inserted = update.update(&self.db).await?;

        let scan = self.scans.create_scan_request(project_id).await?;

        info!(%project_id, name, file_count, "Created project");
        Ok((inserted.into(), scan))
    }

    /// Undo a partial ingest: blobs first, then rows.
    ///
    /// Best-effort; failures are logged and swallowed because the original
    /// ingest error is what the caller needs to see.
    async fn rollback_ingest(&self, project_id: Uuid) {
        if let Err(e) = self.store.delete_prefix(&project_id.to_string()).await {
            error!(%project_id, error = %e, "Rollback: failed to delete stored blobs");
        }

        if let Err(e) = source_file::Entity::delete_many()
            .filter(source_file::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await
        {
            error!(%project_id, error = %e, "Rollback: failed to delete file rows");
        }

        if let Err(e) = project::Entity::delete_by_id(project_id).exec(&self.db).await {
            error!(%project_id, error = %e, "Rollback: failed to delete project row");
        }

        warn!(%project_id, "Rolled back partial project ingest");
    }

    pub async fn get(&self, project_id: Uuid) -> Result<ProjectResponse, AppError> {
        project::Entity::find_by_id(project_id)
            .one(&self.db)
            .await?
            .map(ProjectResponse::from)
            .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
    }

    pub async fn list(&self) -> Result<Vec<ProjectResponse>, AppError> {
        let projects = project::Entity::find()
            .order_by_desc(project::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(projects.into_iter().map(ProjectResponse::from).collect())
    }

    /// Delete a project and everything hanging off it: findings, scans,
    /// file rows, and stored blobs.
    pub async fn delete(&self, project_id: Uuid) -> Result<(), AppError> {
        let existing = project::Entity::find_by_id(project_id).one(&self.db).await?;
        if existing.is_none() {
            return Err(AppError::NotFound(format!("Project {project_id} not found")));
        }

        let scan_ids: Vec<Uuid> = scan::Entity::find()
            .select_only()
            .column(scan::Column::Id)
            .filter(scan::Column::ProjectId.eq(project_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        if !scan_ids.is_empty() {
            finding::Entity::delete_many()
                .filter(finding::Column::ScanId.is_in(scan_ids))
                .exec(&self.db)
                .await?;
        }

        scan::Entity::delete_many()
            .filter(scan::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await?;
        source_file::Entity::delete_many()
            .filter(source_file::Column::ProjectId.eq(project_id))
            .exec(&self.db)
            .await?;
        project::Entity::delete_by_id(project_id).exec(&self.db).await?;

        self.store.delete_prefix(&project_id.to_string()).await?;

        info!(%project_id, "Deleted project");
        Ok(())
    }
}
