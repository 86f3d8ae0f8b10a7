use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A CWE catalog entry; the primary key is the CWE number itself.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "weakness")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,

    pub name: String,
    pub description: String,
    pub url: String,
    /// Cached generic remediation text, lazily filled by the enrichment
    /// batch; never overwritten once set.
    pub generic_fix: Option<String>,

    #[sea_orm(has_many)]
    pub findings: HasMany<super::finding::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
