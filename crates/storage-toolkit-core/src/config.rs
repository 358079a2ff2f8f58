use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_SCAN_TIMEOUT_MINUTES: u64 = 5;
const DEFAULT_DUPLICATE_SCAN_CONCURRENCY: usize = 4;
const MAX_DUPLICATE_SCAN_CONCURRENCY: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// SQLite attachment catalogue.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    /// Directory that relative attachment paths resolve against.
    #[serde(default = "default_storage_root")]
    pub storage_root: String,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    /// A scan running longer than this no longer blocks a new trigger. Zero disables the check.
    #[serde(default = "default_scan_timeout_minutes")]
    pub scan_timeout_minutes: u64,
    #[serde(default = "default_duplicate_scan_concurrency")]
    pub duplicate_scan_concurrency: usize,
    /// Policy templates whose attachments are included in duplicate scans. Empty means all.
    #[serde(default)]
    pub scan_policy_templates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            storage_root: default_storage_root(),
            analysis: AnalysisConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            scan_timeout_minutes: DEFAULT_SCAN_TIMEOUT_MINUTES,
            duplicate_scan_concurrency: DEFAULT_DUPLICATE_SCAN_CONCURRENCY,
            scan_policy_templates: Vec::new(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl AnalysisConfig {
    /// Hashing worker count, clamped to `1..=10`.
    pub fn concurrency(&self) -> usize {
        self.duplicate_scan_concurrency
            .clamp(1, MAX_DUPLICATE_SCAN_CONCURRENCY)
    }

    pub fn scan_timeout(&self) -> Option<Duration> {
        match self.scan_timeout_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(minutes * 60)),
        }
    }
}

fn default_catalog_path() -> String {
    "storage_toolkit.db".to_string()
}

fn default_storage_root() -> String {
    "./attachments".to_string()
}

fn default_scan_timeout_minutes() -> u64 {
    DEFAULT_SCAN_TIMEOUT_MINUTES
}

fn default_duplicate_scan_concurrency() -> usize {
    DEFAULT_DUPLICATE_SCAN_CONCURRENCY
}

fn default_bind_addr() -> String {
    "127.0.0.1:8090".to_string()
}

/// Load `Config.toml` (optional) overlaid with `STORAGE_TOOLKIT__*` environment variables.
pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("STORAGE_TOOLKIT")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("analysis.scan_policy_templates")
                .try_parsing(true),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
