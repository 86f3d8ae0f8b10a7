use std::time::Duration;

use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use tracing::{error, info};
use uuid::Uuid;

use common::ScanStatus;
use common::entity::scan;

use crate::config::SweeperConfig;

/// Run the stuck scan sweeper as a background task.
///
/// A worker crash leaves its scan in Pending or In Progress forever; the
/// sweeper moves such rows to Failed once they go stale.
pub async fn run_stuck_scan_sweeper(db: DatabaseConnection, config: SweeperConfig) {
    info!(
        timeout_secs = config.stuck_timeout_secs,
        scan_interval_secs = config.scan_interval_secs,
        "Starting stuck scan sweeper"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(config.scan_interval_secs));

    loop {
        interval.tick().await;

        match sweep_stuck_scans(&db, config.stuck_timeout_secs).await {
            Ok(0) => {}
            Ok(count) => info!(count, "Marked stuck scans as failed"),
            Err(e) => error!(error = %e, "Stuck scan sweep failed"),
        }
    }
}

/// Mark every non-terminal scan not updated within `stuck_timeout_secs` as
/// Failed. Returns the number of scans updated.
pub async fn sweep_stuck_scans(
    db: &DatabaseConnection,
    stuck_timeout_secs: u64,
) -> anyhow::Result<u64> {
    let threshold = Utc::now() - chrono::Duration::seconds(stuck_timeout_secs as i64);

    let stuck_ids: Vec<Uuid> = scan::Entity::find()
        .select_only()
        .column(scan::Column::Id)
        .filter(
            scan::Column::Status.is_in([ScanStatus::Pending, ScanStatus::InProgress]),
        )
        .filter(scan::Column::UpdatedAt.lt(threshold))
        .into_tuple()
        .all(db)
        .await?;

    let mut updated = 0u64;
    for scan_id in stuck_ids {
        match mark_scan_stuck(db, scan_id, stuck_timeout_secs).await {
            Ok(true) => updated += 1,
            Ok(false) => {}
            Err(e) => error!(%scan_id, error = %e, "Failed to mark stuck scan"),
        }
    }

    Ok(updated)
}

/// Conditionally fail one scan, re-checking its status inside a transaction
/// so a scan that completed between the select and the update is left alone.
async fn mark_scan_stuck(
    db: &DatabaseConnection,
    scan_id: Uuid,
    stuck_timeout_secs: u64,
) -> anyhow::Result<bool> {
    let txn = db.begin().await?;

    let result = scan::Entity::update_many()
        .set(scan::ActiveModel {
            status: Set(ScanStatus::Failed),
            status_message: Set(Some(format!(
                "Scan made no progress for over {stuck_timeout_secs} seconds"
            ))),
            updated_at: Set(Utc::now()),
            ..Default::default()
        })
        .filter(scan::Column::Id.eq(scan_id))
        .filter(
            scan::Column::Status.is_in([ScanStatus::Pending, ScanStatus::InProgress]),
        )
        .exec(&txn)
        .await?;

    txn.commit().await?;

    if result.rows_affected > 0 {
        info!(%scan_id, "Marked stuck scan as failed");
    }
    Ok(result.rows_affected > 0)
}
