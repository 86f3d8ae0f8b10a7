use thiserror::Error;

use common::storage::StorageError;

use crate::models::analyzer::AnalyzerError;

/// Per-file failure inside a scan run. None of these abort the scan; the
/// handler logs them and moves on to the next file.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Analyzer error: {0}")]
    Analyzer(#[from] AnalyzerError),
}
