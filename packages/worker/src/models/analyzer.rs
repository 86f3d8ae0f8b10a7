use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use common::Severity;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("analyzer exited with {status}: {stderr}")]
    Failed { status: i32, stderr: String },

    #[error("analyzer timed out after {0}s")]
    Timeout(u64),

    #[error("analyzer produced no report")]
    MissingReport,

    #[error("malformed report: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Static analyzer over a single source file.
///
/// The orchestrator only sees this trait, so tests can script findings
/// without a real analyzer binary on the machine.
#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(&self, path: &Path) -> Result<Vec<RawFinding>, AnalyzerError>;
}

/// Top-level analyzer JSON report.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReport {
    #[serde(default)]
    pub results: Vec<RawFinding>,
}

/// One result entry as the analyzer emits it. Every field is optional on
/// the wire; [`RawFinding::normalize`] fills in the documented defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFinding {
    pub test_id: Option<String>,
    pub issue_text: Option<String>,
    pub issue_severity: Option<String>,
    pub issue_confidence: Option<String>,
    #[serde(default)]
    pub line_range: Vec<i64>,
    pub code: Option<String>,
    pub issue_cwe: Option<RawCwe>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawCwe {
    pub id: Option<i64>,
}

/// A finding after normalization, ready to persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFinding {
    pub rule_id: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: Severity,
    pub line_start: i32,
    pub line_end: i32,
    pub code_snippet: Option<String>,
    pub weakness_id: Option<i32>,
}

impl RawFinding {
    /// Apply defaults and collapse the line range.
    ///
    /// A result with an empty line range carries no usable location and is
    /// dropped rather than persisted with made-up lines.
    pub fn normalize(self) -> Option<NormalizedFinding> {
        let (first, last) = match (self.line_range.first(), self.line_range.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                warn!(
                    test_id = self.test_id.as_deref().unwrap_or("unknown"),
                    "Dropping analyzer result without a line range"
                );
                return None;
            }
        };
        let (line_start, line_end) = if first <= last {
            (first, last)
        } else {
            (last, first)
        };

        Some(NormalizedFinding {
            rule_id: self.test_id.unwrap_or_else(|| "unknown".into()),
            description: self.issue_text.unwrap_or_default(),
            severity: Severity::from_raw(self.issue_severity.as_deref()),
            confidence: Severity::from_raw(self.issue_confidence.as_deref()),
            line_start: line_start as i32,
            line_end: line_end as i32,
            code_snippet: self.code.filter(|c| !c.is_empty()),
            weakness_id: self
                .issue_cwe
                .and_then(|cwe| cwe.id)
                .and_then(|id| i32::try_from(id).ok()),
        })
    }
}
