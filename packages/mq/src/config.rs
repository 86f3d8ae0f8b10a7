// Re-exports of broccoli_queue's config types; we have no reason to wrap
// them yet.

pub type PublishConfig = broccoli_queue::queue::PublishOptions;
pub type ConsumeConfig = broccoli_queue::queue::ConsumeOptions;
pub type RetryStrategy = broccoli_queue::queue::RetryStrategy;
