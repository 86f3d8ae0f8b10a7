use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

pub use common::config::{DatabaseAppConfig, MqAppConfig, StorageAppConfig};

/// Worker-specific configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerConfig {
    /// Unique identifier for this worker instance. Default: "worker-1".
    #[serde(default = "default_worker_id")]
    pub id: String,
    /// Analyzer executable path. Default: "bandit".
    #[serde(default = "default_analyzer_bin")]
    pub analyzer_bin: String,
    /// Hard cap on a single analyzer run. Default: 60 seconds.
    #[serde(default = "default_analyzer_timeout_secs")]
    pub analyzer_timeout_secs: u64,
}

fn default_worker_id() -> String {
    "worker-1".into()
}
fn default_analyzer_bin() -> String {
    "bandit".into()
}
fn default_analyzer_timeout_secs() -> u64 {
    60
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            id: default_worker_id(),
            analyzer_bin: default_analyzer_bin(),
            analyzer_timeout_secs: default_analyzer_timeout_secs(),
        }
    }
}

/// Worker application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerAppConfig {
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub database: DatabaseAppConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
}

impl WorkerAppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("VULNSCAN_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let s = Config::builder()
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("VULNSCAN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
