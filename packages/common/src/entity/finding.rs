use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::severity::Severity;

/// A single vulnerability reported by the analyzer for one file.
#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "finding")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Analyzer rule identifier (e.g. "B602").
    pub rule_id: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: Severity,
    pub line_start: i32,
    pub line_end: i32,
    pub code_snippet: Option<String>,

    pub scan_id: Uuid,
    #[sea_orm(belongs_to, from = "scan_id", to = "id")]
    pub scan: HasOne<super::scan::Entity>,

    pub file_id: Uuid,
    #[sea_orm(belongs_to, from = "file_id", to = "id")]
    pub file: HasOne<super::source_file::Entity>,

    /// NULL when the analyzer did not map the rule to a CWE.
    pub weakness_id: Option<i32>,
    #[sea_orm(belongs_to, from = "weakness_id", to = "id")]
    pub weakness: HasOne<super::weakness::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
