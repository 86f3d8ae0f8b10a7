use chrono::Utc;
use sea_orm::sea_query::{Index, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use common::entity::{finding, source_file, weakness};

/// CWE catalog entries seeded on startup: (id, name, description).
///
/// Covers the weaknesses the analyzer maps its rules to. `generic_fix`
/// starts NULL and is filled by the batch enrichment job.
const DEFAULT_WEAKNESSES: &[(i32, &str, &str)] = &[
    (
        20,
        "Improper Input Validation",
        "The product receives input but does not validate it before use.",
    ),
    (
        22,
        "Path Traversal",
        "Improper limitation of a pathname to a restricted directory.",
    ),
    (
        78,
        "OS Command Injection",
        "Improper neutralization of special elements used in an OS command.",
    ),
    (
        89,
        "SQL Injection",
        "Improper neutralization of special elements used in an SQL command.",
    ),
    (
        259,
        "Use of Hard-coded Password",
        "The product contains a hard-coded password for authentication.",
    ),
    (
        327,
        "Use of a Broken or Risky Cryptographic Algorithm",
        "A broken or weak cryptographic algorithm is used to protect data.",
    ),
    (
        330,
        "Use of Insufficiently Random Values",
        "Predictable values are used in a security context.",
    ),
    (
        400,
        "Uncontrolled Resource Consumption",
        "The product does not limit the amount of resources consumed.",
    ),
    (
        502,
        "Deserialization of Untrusted Data",
        "The product deserializes untrusted data without verifying it.",
    ),
    (
        605,
        "Multiple Binds to the Same Port",
        "Binding to all network interfaces exposes the service unnecessarily.",
    ),
    (
        703,
        "Improper Check or Handling of Exceptional Conditions",
        "The product does not correctly anticipate or handle exceptional conditions.",
    ),
];

fn cwe_url(id: i32) -> String {
    format!("https://cwe.mitre.org/data/definitions/{id}.html")
}

/// Seed the weakness catalog with defaults. Existing rows are left alone.
pub async fn seed_weaknesses(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut inserted = 0u32;
    for &(id, name, description) in DEFAULT_WEAKNESSES {
        let model = weakness::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            description: Set(description.to_string()),
            url: Set(cwe_url(id)),
            generic_fix: Set(None),
            created_at: Set(Utc::now()),
        };

        let result = weakness::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(weakness::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(_) => inserted += 1,
            Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }
    }

    if inserted > 0 {
        info!("Seeded {} new weakness catalog entries", inserted);
    }

    Ok(())
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite indexes, so we create
/// them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // One row per (project, path); re-ingesting the same repo must not
    // duplicate file rows.
    let stmt = Index::create()
        .if_not_exists()
        .unique()
        .name("idx_source_file_project_path")
        .table(source_file::Entity)
        .col(source_file::Column::ProjectId)
        .col(source_file::Column::FilePath)
        .to_string(PostgresQueryBuilder);

    let result = db.execute_unprepared(&stmt).await;
    match result {
        Ok(_) => {
            info!("Ensured index idx_source_file_project_path exists");
        }
        Err(e) => {
            tracing::warn!("Failed to create index idx_source_file_project_path: {}", e);
        }
    }

    // Report building always filters findings by scan.
    let stmt = Index::create()
        .if_not_exists()
        .name("idx_finding_scan")
        .table(finding::Entity)
        .col(finding::Column::ScanId)
        .to_string(PostgresQueryBuilder);

    let result = db.execute_unprepared(&stmt).await;
    match result {
        Ok(_) => {
            info!("Ensured index idx_finding_scan exists");
        }
        Err(e) => {
            tracing::warn!("Failed to create index idx_finding_scan: {}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_db;

    #[tokio::test]
    async fn seeding_is_idempotent() {
        let db = test_db().await;

        seed_weaknesses(&db).await.unwrap();
        let first = weakness::Entity::find().all(&db).await.unwrap();
        assert_eq!(first.len(), DEFAULT_WEAKNESSES.len());

        seed_weaknesses(&db).await.unwrap();
        let second = weakness::Entity::find().all(&db).await.unwrap();
        assert_eq!(second.len(), first.len());
    }

    #[tokio::test]
    async fn seeded_rows_have_no_generic_fix() {
        let db = test_db().await;
        seed_weaknesses(&db).await.unwrap();

        let rows = weakness::Entity::find().all(&db).await.unwrap();
        assert!(rows.iter().all(|r| r.generic_fix.is_none()));
        assert!(rows.iter().all(|r| r.url.contains("cwe.mitre.org")));
    }
}
