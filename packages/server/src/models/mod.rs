pub mod project;
pub mod report;
pub mod scan;

pub use project::{CreateProjectRequest, ProjectResponse};
pub use report::{Report, ReportSummary, ReportVulnerability, SeverityCounts, WeaknessDetails};
pub use scan::ScanResponse;
