pub mod config;
pub mod mq;
pub mod retry;
pub mod scan_job;
pub mod scan_status;
pub mod severity;
pub mod storage;

#[cfg(feature = "sea-orm")]
pub mod entity;

pub use scan_job::{ScanJob, ScanRequest};
pub use scan_status::ScanStatus;
pub use severity::Severity;
