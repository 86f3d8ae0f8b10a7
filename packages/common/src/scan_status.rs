use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Status of a scan during the orchestration lifecycle.
///
/// Transitions only ever move forward: `Pending -> InProgress -> Completed`,
/// or straight to `Failed` from a non-terminal state. `Completed` and
/// `Failed` are terminal.
///
/// When the `sea-orm` feature is enabled, this enum can be used directly in
/// SeaORM entities (stored as its numeric wire code).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "i16", db_type = "SmallInteger")
)]
#[serde(rename_all = "PascalCase")]
pub enum ScanStatus {
    /// Waiting to be picked up by the orchestrator.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 0))]
    Pending,
    /// Files are being analyzed.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 1))]
    InProgress,
    /// All files processed, final statistics recorded.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = 3))]
    Completed,
    /// No files to scan, or the run was given up on.
    #[cfg_attr(feature = "sea-orm", sea_orm(num_value = -1))]
    Failed,
}

impl ScanStatus {
    /// All possible status values.
    pub const ALL: &'static [ScanStatus] = &[
        Self::Pending,
        Self::InProgress,
        Self::Completed,
        Self::Failed,
    ];

    /// The numeric wire code exposed to external readers.
    pub fn code(&self) -> i16 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed => 3,
            Self::Failed => -1,
        }
    }

    /// Decode a wire code.
    ///
    /// Code 2 is a legacy alias for `InProgress` kept for old rows and old
    /// readers; it is accepted here but never written.
    pub fn from_code(code: i16) -> Option<ScanStatus> {
        match code {
            0 => Some(Self::Pending),
            1 | 2 => Some(Self::InProgress),
            3 => Some(Self::Completed),
            -1 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` keeps the lifecycle moving forward.
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::InProgress) => true,
            (Self::Pending, Self::Failed) => true,
            (Self::InProgress, Self::Completed) => true,
            // Used by the stuck-scan sweeper for crashed runs.
            (Self::InProgress, Self::Failed) => true,
            _ => false,
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid status label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    invalid: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid status '{}'. Valid values: {}",
            self.invalid,
            ScanStatus::ALL
                .iter()
                .map(|s| s.label())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for ScanStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "In Progress" | "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            _ => Err(ParseStatusError {
                invalid: s.to_string(),
            }),
        }
    }
}
