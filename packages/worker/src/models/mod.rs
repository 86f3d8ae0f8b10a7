pub mod analyzer;
pub mod bandit;
