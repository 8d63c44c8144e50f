use std::path::PathBuf;

use veil_config::data_dir;

/// Veil CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding `store.json` and `logs/`
    pub data_dir: PathBuf,
    /// Host the rules are scoped to when no page snapshot names one
    pub host: Option<String>,
    /// Log level
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self {
            data_dir: data_dir(),
            host: std::env::var("VEIL_HOST").ok().filter(|h| !h.is_empty()),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()),
        }
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}
