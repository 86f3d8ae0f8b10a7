use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ingested source file.
///
/// `file_path` is the path relative to the repository root, and doubles as
/// the blob storage key suffix (`{project_id}/{file_path}`). The
/// (project_id, file_path) pair is kept unique by an index created at
/// startup.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "source_file")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub file_path: String,
    /// Non-blank line count.
    pub loc: i32,

    pub project_id: Uuid,
    #[sea_orm(belongs_to, from = "project_id", to = "id")]
    pub project: HasOne<super::project::Entity>,

    #[sea_orm(has_many)]
    pub findings: HasMany<super::finding::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
