//! Configuration for the Auto Steer CLI, read from `.autosteer/autosteer.toml`.
//!
//! Every field has a default, so a missing file is the same as an empty one.
//! Settings are layered: file, then environment, then CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [storage]
//! db_path = ".autosteer/autosteer.db"
//!
//! [engine]
//! allow_restart = true
//! metrics_timeout_secs = 300
//!
//! [logging]
//! level = "info"
//! format = "compact"
//! directory = ".autosteer/logs"
//!
//! [history]
//! default_limit = 20
//! ```
//!
//! `AUTOSTEER_DB` overrides `storage.db_path` and `AUTOSTEER_LOG` overrides
//! `logging.level`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::orchestrator::OrchestratorConfig;

pub const STEER_DIR: &str = ".autosteer";
pub const CONFIG_FILE: &str = "autosteer.toml";
pub const DB_ENV: &str = "AUTOSTEER_DB";
pub const LOG_ENV: &str = "AUTOSTEER_LOG";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Compact => write!(f, "compact"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Invalid log format '{}'. Valid values: compact, json", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database, relative to the project directory unless absolute
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from(STEER_DIR).join("autosteer.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allow `start` on a task that already has an active execution
    #[serde(default = "default_allow_restart")]
    pub allow_restart: bool,
    /// Metrics collection timeout in seconds; 0 disables it
    #[serde(default = "default_metrics_timeout_secs")]
    pub metrics_timeout_secs: u64,
}

fn default_allow_restart() -> bool {
    true
}

fn default_metrics_timeout_secs() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_restart: default_allow_restart(),
            metrics_timeout_secs: default_metrics_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
    /// Directory for daily-rolling log files; unset disables file logging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_history_limit")]
    pub default_limit: usize,
}

fn default_history_limit() -> usize {
    20
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            default_limit: default_history_limit(),
        }
    }
}

/// Contents of `autosteer.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SteerToml {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

impl SteerToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse autosteer.toml")
    }

    /// Load `autosteer.toml` from `steer_dir`, or defaults if it does not exist.
    pub fn load_or_default(steer_dir: &Path) -> Result<Self> {
        let config_path = steer_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize autosteer.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Database path, with `AUTOSTEER_DB` taking precedence over the file.
    pub fn db_path(&self) -> PathBuf {
        std::env::var(DB_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| self.storage.db_path.clone())
    }

    /// Log level, with `AUTOSTEER_LOG` taking precedence over the file.
    pub fn log_level(&self) -> String {
        std::env::var(LOG_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.logging.level.clone())
    }

    pub fn metrics_timeout(&self) -> Option<Duration> {
        match self.engine.metrics_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            allow_restart: self.engine.allow_restart,
            metrics_timeout: self.metrics_timeout(),
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if tracing_subscriber::EnvFilter::try_new(&self.logging.level).is_err() {
            warnings.push(format!(
                "Invalid logging.level '{}': expected a level such as 'info' or a filter directive",
                self.logging.level
            ));
        }

        if self.history.default_limit == 0 {
            warnings.push("history.default_limit is 0: history will always be empty".to_string());
        }

        if self.storage.db_path.as_os_str().is_empty() {
            warnings.push("storage.db_path is empty".to_string());
        }

        warnings
    }
}

/// Resolved configuration for one CLI invocation.
#[derive(Debug, Clone)]
pub struct SteerConfig {
    /// Path to the project directory
    pub project_dir: PathBuf,
    /// Path to the .autosteer directory
    pub steer_dir: PathBuf,
    /// Parsed autosteer.toml
    pub toml: SteerToml,
    /// CLI override: verbose logging
    pub verbose: bool,
}

impl SteerConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let steer_dir = project_dir.join(STEER_DIR);
        let toml = SteerToml::load_or_default(&steer_dir)?;

        Ok(Self {
            project_dir,
            steer_dir,
            toml,
            verbose: false,
        })
    }

    pub fn with_cli_args(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        Ok(config)
    }

    pub fn config_file(&self) -> PathBuf {
        self.steer_dir.join(CONFIG_FILE)
    }

    /// Database path resolved against the project directory.
    pub fn db_path(&self) -> PathBuf {
        self.resolve(self.toml.db_path())
    }

    pub fn log_dir(&self) -> Option<PathBuf> {
        self.toml.logging.directory.clone().map(|d| self.resolve(d))
    }

    /// Effective log level (CLI verbose → env → file).
    pub fn log_level(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.toml.log_level()
        }
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        if path.is_absolute() {
            path
        } else {
            self.project_dir.join(path)
        }
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_from_empty_file() {
        let toml = SteerToml::parse("").unwrap();
        assert_eq!(toml.storage.db_path, PathBuf::from(".autosteer/autosteer.db"));
        assert!(toml.engine.allow_restart);
        assert_eq!(toml.engine.metrics_timeout_secs, 300);
        assert_eq!(toml.logging.format, LogFormat::Compact);
        assert_eq!(toml.history.default_limit, 20);
        assert!(toml.validate().is_empty());
    }

    #[test]
    fn test_parse_full_file() {
        let content = r#"
[storage]
db_path = "/var/lib/autosteer.db"

[engine]
allow_restart = false
metrics_timeout_secs = 0

[logging]
level = "debug"
format = "json"
directory = "logs"

[history]
default_limit = 5
"#;
        let toml = SteerToml::parse(content).unwrap();
        assert_eq!(toml.logging.format, LogFormat::Json);
        assert_eq!(toml.metrics_timeout(), None);
        let orch = toml.orchestrator_config();
        assert!(!orch.allow_restart);
        assert_eq!(orch.metrics_timeout, None);
        assert_eq!(toml.history.default_limit, 5);
    }

    #[test]
    fn test_invalid_format_is_parse_error() {
        assert!(SteerToml::parse("[logging]\nformat = \"xml\"\n").is_err());
    }

    #[test]
    fn test_validate_warnings() {
        let toml = SteerToml::parse("[history]\ndefault_limit = 0\n[logging]\nlevel = \"autosteer=loud\"\n").unwrap();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().any(|w| w.contains("default_limit")));
        assert!(warnings.iter().any(|w| w.contains("logging.level")));
    }

    #[test]
    fn test_env_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved_db = std::env::var(DB_ENV).ok();
        let saved_log = std::env::var(LOG_ENV).ok();

        unsafe {
            std::env::set_var(DB_ENV, "/tmp/override.db");
            std::env::set_var(LOG_ENV, "trace");
        }
        let toml = SteerToml::default();
        assert_eq!(toml.db_path(), PathBuf::from("/tmp/override.db"));
        assert_eq!(toml.log_level(), "trace");

        unsafe {
            std::env::remove_var(DB_ENV);
            std::env::remove_var(LOG_ENV);
        }
        assert_eq!(toml.db_path(), PathBuf::from(".autosteer/autosteer.db"));
        assert_eq!(toml.log_level(), "info");

        unsafe {
            if let Some(v) = saved_db {
                std::env::set_var(DB_ENV, v);
            }
            if let Some(v) = saved_log {
                std::env::set_var(LOG_ENV, v);
            }
        }
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = TempDir::new()?;
        let mut toml = SteerToml::default();
        toml.engine.allow_restart = false;
        toml.save(&dir.path().join(CONFIG_FILE))?;

        let loaded = SteerToml::load_or_default(dir.path())?;
        assert!(!loaded.engine.allow_restart);

        let missing = SteerToml::load_or_default(&dir.path().join("nope"))?;
        assert!(missing.engine.allow_restart);
        Ok(())
    }

    #[test]
    fn test_steer_config_resolves_paths() -> Result<()> {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved_db = std::env::var(DB_ENV).ok();
        unsafe { std::env::remove_var(DB_ENV) };

        let dir = TempDir::new()?;
        std::fs::create_dir_all(dir.path().join(STEER_DIR))?;
        std::fs::write(
            dir.path().join(STEER_DIR).join(CONFIG_FILE),
            "[logging]\ndirectory = \"logs\"\n",
        )?;

        let config = SteerConfig::with_cli_args(dir.path().to_path_buf(), true)?;
        assert!(config.db_path().starts_with(&config.project_dir));
        assert!(config.db_path().ends_with(".autosteer/autosteer.db"));
        assert_eq!(config.log_dir(), Some(config.project_dir.join("logs")));
        assert_eq!(config.log_level(), "debug");

        if let Some(v) = saved_db {
            unsafe { std::env::set_var(DB_ENV, v) };
        }
        Ok(())
    }
}
