use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::entity::project;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub repo_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectResponse {
    pub id: Uuid,
    pub name: String,
    pub repo_url: String,
    pub file_count: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl From<project::Model> for ProjectResponse {
    fn from(model: project::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            repo_url: model.repo_url,
            file_count: model.file_count,
            created_at: model.created_at,
        }
    }
}
