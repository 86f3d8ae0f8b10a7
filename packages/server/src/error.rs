use sea_orm::DbErr;
use thiserror::Error;

use common::mq::MqError;
use common::storage::StorageError;

/// Application-level error type shared by all services.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The repository could not be cloned (bad URL, auth, network).
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The repository cloned fine but contained nothing to scan.
    #[error("no scannable files found")]
    EmptySource,

    /// Ingestion failed partway; any partial state has been rolled back.
    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<MqError> for AppError {
    fn from(err: MqError) -> Self {
        AppError::Internal(err.to_string())
    }
}
