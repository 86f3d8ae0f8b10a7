use async_trait::async_trait;
use thiserror::Error;

use crate::scan_job::ScanJob;

/// Publish side of the scan request queue.
///
/// Services take this as an injected dependency so tests can substitute an
/// in-memory fake; the real implementation lives in the `mq` package.
#[async_trait]
pub trait ScanJobQueue: Send + Sync {
    async fn enqueue(&self, job: ScanJob) -> Result<(), MqError>;
}

#[derive(Debug, Error)]
pub enum MqError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
