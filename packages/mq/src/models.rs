use std::sync::Arc;

use async_trait::async_trait;
use broccoli_queue::queue::BroccoliQueueBuilder;
pub use broccoli_queue::{
    brokers::broker::BrokerMessage,
    error::BroccoliError,
    queue::{BroccoliQueue, ConsumeOptions},
};
use tracing::info;

use common::ScanJob;
use common::mq::{MqError as CommonMqError, ScanJobQueue};

use crate::error::MqError;

pub type MqQueue = BroccoliQueue;
pub type MqBuilder = BroccoliQueueBuilder;

pub struct MqConfig {
    pub url: String,
    pub pool_size: u8,
}

pub async fn init_mq(config: MqConfig) -> Result<MqQueue, MqError> {
    BroccoliQueue::builder(&config.url)
        .pool_connections(config.pool_size)
        .build()
        .await
        .map_err(MqError::from)
}

/// Redis-backed implementation of the scan request queue.
///
/// Services depend on `common::mq::ScanJobQueue`; this adapter is the only
/// place that knows about broccoli.
pub struct ScanJobPublisher {
    mq: Arc<MqQueue>,
    queue_name: String,
}

impl ScanJobPublisher {
    pub fn new(mq: Arc<MqQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            mq,
            queue_name: queue_name.into(),
        }
    }
}

#[async_trait]
impl ScanJobQueue for ScanJobPublisher {
    async fn enqueue(&self, job: ScanJob) -> Result<(), CommonMqError> {
        self.mq
            .publish(&self.queue_name, None, &job, None)
            .await
            .map_err(|e| CommonMqError::Publish(e.to_string()))?;

        info!(
            queue = %self.queue_name,
            scan_id = %job.scan_id,
            project_id = %job.project_id,
            "Published scan job"
        );
        Ok(())
    }
}
