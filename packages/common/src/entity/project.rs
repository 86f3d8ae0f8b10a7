use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A registered source repository.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "project")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique)]
    pub name: String,
    pub repo_url: String,
    /// Set once the fetcher has finished ingesting the repository.
    pub file_count: Option<i32>,

    #[sea_orm(has_many)]
    pub source_files: HasMany<super::source_file::Entity>,

    #[sea_orm(has_many)]
    pub scans: HasMany<super::scan::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
