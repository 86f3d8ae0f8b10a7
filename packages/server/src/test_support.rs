use async_trait::async_trait;
use sea_orm::{Database, DatabaseConnection};
use tokio::sync::Mutex;

use common::ScanJob;
use common::mq::{MqError, ScanJobQueue};

/// Fresh in-memory database with the full schema synced.
pub async fn test_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.get_schema_registry("common::entity::*")
        .sync(&db)
        .await
        .unwrap();
    db
}

/// Queue fake that records every published job.
#[derive(Default)]
pub struct RecordingQueue {
    pub jobs: Mutex<Vec<ScanJob>>,
}

#[async_trait]
impl ScanJobQueue for RecordingQueue {
    async fn enqueue(&self, job: ScanJob) -> Result<(), MqError> {
        self.jobs.lock().await.push(job);
        Ok(())
    }
}

/// Queue fake that always fails to publish.
pub struct FailingQueue;

#[async_trait]
impl ScanJobQueue for FailingQueue {
    async fn enqueue(&self, _job: ScanJob) -> Result<(), MqError> {
        Err(MqError::Publish("broker unavailable".into()))
    }
}
