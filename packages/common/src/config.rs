use serde::Deserialize;

/// App-level MQ configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct MqAppConfig {
    /// Redis connection URL. Default: "redis://localhost:6379".
    #[serde(default = "default_mq_url")]
    pub url: String,
    /// Connection pool size. Default: 5.
    #[serde(default = "default_mq_pool_size")]
    pub pool_size: u8,
    /// Queue name for scan requests (server publishes, worker consumes).
    /// Default: "scan_jobs".
    #[serde(default = "default_mq_queue_name")]
    pub queue_name: String,
}

fn default_mq_url() -> String {
    "redis://localhost:6379".into()
}
fn default_mq_pool_size() -> u8 {
    5
}
fn default_mq_queue_name() -> String {
    "scan_jobs".into()
}

impl Default for MqAppConfig {
    fn default() -> Self {
        Self {
            url: default_mq_url(),
            pool_size: default_mq_pool_size(),
            queue_name: default_mq_queue_name(),
        }
    }
}

/// Database connection configuration shared by server and worker.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseAppConfig {
    /// Default: "postgres://localhost/vulnscan".
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "postgres://localhost/vulnscan".into()
}

impl Default for DatabaseAppConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Object storage configuration shared by server and worker.
///
/// Both sides must point at the same root: the fetcher uploads file blobs
/// under `{project_id}/{relative_path}` and the orchestrator downloads them.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageAppConfig {
    /// Root directory for stored file blobs. Default: "./data/blobs".
    #[serde(default = "default_storage_root")]
    pub root: String,
    /// Maximum size in bytes for a single stored file. Default: 10 MiB.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_storage_root() -> String {
    "./data/blobs".into()
}
fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for StorageAppConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            max_file_size: default_max_file_size(),
        }
    }
}
