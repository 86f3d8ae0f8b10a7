#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity scale used for both a finding's severity and its confidence.
///
/// Analyzers may omit either value; the canonical default is `Low`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "LOW"))]
    Low,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "MEDIUM"))]
    Medium,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "HIGH"))]
    High,
}

impl Severity {
    /// All severity values, lowest first.
    pub const ALL: &'static [Severity] = &[Self::Low, Self::Medium, Self::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }

    /// Parse a raw analyzer value, defaulting to `Low` when the value is
    /// missing or unrecognized.
    pub fn from_raw(raw: Option<&str>) -> Severity {
        raw.and_then(|s| s.parse().ok()).unwrap_or(Self::Low)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Severity {
    fn default() -> Self {
        Self::Low
    }
}

/// Error when parsing an invalid severity string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSeverityError {
    invalid: String,
}

impl fmt::Display for ParseSeverityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid severity '{}'. Valid values: LOW, MEDIUM, HIGH",
            self.invalid
        )
    }
}

impl std::error::Error for ParseSeverityError {}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(ParseSeverityError {
                invalid: s.to_string(),
            }),
        }
    }
}
