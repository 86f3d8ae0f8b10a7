use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::analyzer::{Analyzer, AnalyzerError, RawFinding, RawReport};

/// Runs the `bandit` binary against one file and parses its JSON report.
pub struct BanditAnalyzer {
    bin: String,
    timeout: Duration,
}

impl BanditAnalyzer {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            timeout,
        }
    }
}

#[async_trait]
impl Analyzer for BanditAnalyzer {
    async fn analyze(&self, path: &Path) -> Result<Vec<RawFinding>, AnalyzerError> {
        let out_dir = tempfile::tempdir()?;
        let report_path = out_dir.path().join("report.json");

        let child = Command::new(&self.bin)
            .arg("-f")
            .arg("json")
            .arg("-o")
            .arg(&report_path)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(AnalyzerError::Timeout(self.timeout.as_secs())),
        };

        // Exit 0 means clean, 1 means issues found. Anything else is a
        // real failure.
        match output.status.code() {
            Some(0 | 1) => {}
            Some(code) => {
                return Err(AnalyzerError::Failed {
                    status: code,
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
            None => {
                return Err(AnalyzerError::Failed {
                    status: -1,
                    stderr: "terminated by signal".into(),
                });
            }
        }

        let report_bytes = match tokio::fs::read(&report_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalyzerError::MissingReport);
            }
            Err(e) => return Err(e.into()),
        };

        let report: RawReport = serde_json::from_slice(&report_bytes)?;
        debug!(
            file = %path.display(),
            results = report.results.len(),
            "Analyzer run finished"
        );
        Ok(report.results)
    }
}
