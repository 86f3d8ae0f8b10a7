use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use common::config::{DatabaseAppConfig, MqAppConfig, StorageAppConfig};

/// Source fetcher settings.
#[derive(Debug, Deserialize, Clone)]
pub struct FetcherConfig {
    /// Path to the git binary used for shallow clones.
    #[serde(default = "default_git_bin")]
    pub git_bin: String,
    /// Hard cap on clone time. Default: 300 seconds.
    #[serde(default = "default_clone_timeout_secs")]
    pub clone_timeout_secs: u64,
    /// URL schemes accepted for repository URLs. Default: ["https"].
    #[serde(default = "default_allowed_schemes")]
    pub allowed_schemes: Vec<String>,
}

fn default_git_bin() -> String {
    "git".into()
}
fn default_clone_timeout_secs() -> u64 {
    300
}
fn default_allowed_schemes() -> Vec<String> {
    vec!["https".into()]
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            git_bin: default_git_bin(),
            clone_timeout_secs: default_clone_timeout_secs(),
            allowed_schemes: default_allowed_schemes(),
        }
    }
}

/// Fix suggestion backend settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EnrichmentConfig {
    /// Chat-completions endpoint of the suggestion backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Per-finding budget when building a report; on expiry the report
    /// falls back to the precomputed fix.
    #[serde(default = "default_suggestion_timeout_secs")]
    pub suggestion_timeout_secs: u64,
    /// HTTP client timeout for batch enrichment requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Minimum delay between consecutive batch requests.
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_ms: u64,
    /// Attempts per finding when the backend reports overload.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_backend_url() -> String {
    "http://localhost:8001/v1/chat/completions".into()
}
fn default_model() -> String {
    "default".into()
}
fn default_suggestion_timeout_secs() -> u64 {
    30
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_min_delay_ms() -> u64 {
    500
}
fn default_max_attempts() -> u8 {
    3
}
fn default_max_tokens() -> u32 {
    512
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            model: default_model(),
            suggestion_timeout_secs: default_suggestion_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            min_delay_ms: default_min_delay_ms(),
            max_attempts: default_max_attempts(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Stuck scan sweeper settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SweeperConfig {
    /// Scans not updated for this long are marked Failed. Default: 1 hour.
    #[serde(default = "default_stuck_timeout_secs")]
    pub stuck_timeout_secs: u64,
    #[serde(default = "default_scan_interval_secs")]
    pub scan_interval_secs: u64,
}

fn default_stuck_timeout_secs() -> u64 {
    3600
}
fn default_scan_interval_secs() -> u64 {
    300
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            stuck_timeout_secs: default_stuck_timeout_secs(),
            scan_interval_secs: default_scan_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseAppConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub mq: MqAppConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub sweeper: SweeperConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let s = Config::builder()
            // Load from config/config.toml
            .add_source(File::with_name("config/config").required(false))
            // Override from environment (e.g., VULNSCAN__DATABASE__URL)
            .add_source(Environment::with_prefix("VULNSCAN").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
