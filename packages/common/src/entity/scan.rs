use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::scan_status::ScanStatus;

/// One scan run over a project's files.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "scan")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub status: ScanStatus,
    /// Failure reason, populated only when status is Failed.
    pub status_message: Option<String>,

    /// Files processed, including ones that failed individually.
    pub scanned_files_count: Option<i32>,
    pub total_vuln_count: Option<i32>,
    /// Wall-clock duration in seconds, rounded to two decimals.
    pub duration_secs: Option<f64>,

    pub project_id: Uuid,
    #[sea_orm(belongs_to, from = "project_id", to = "id")]
    pub project: HasOne<super::project::Entity>,

    #[sea_orm(has_many)]
    pub findings: HasMany<super::finding::Entity>,

    pub created_at: DateTimeUtc,
    /// Bumped on every status change; the sweeper uses it to find stuck runs.
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
