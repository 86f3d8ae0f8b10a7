pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod seed;
pub mod services;
pub mod sweeper;

#[cfg(test)]
pub(crate) mod test_support;
