pub mod enrichment;
pub mod fetcher;
pub mod project;
pub mod report;
pub mod scan;
