//! TOML configuration file parsing and loading
//!
//! Precedence, lowest first: built-in defaults, the configuration file,
//! environment variables (credentials and scanner location), command-line
//! flags (logging).

use crate::core::error_handling::ContextualError;
use crate::github::client::DEFAULT_ATTEMPTS_PER_CREDENTIAL;
use crate::github::pool::DEFAULT_MIN_COOLDOWN_SECS;
use crate::github::DEFAULT_API_URL;
use crate::jobs::{CoordinatorSettings, ReconcileSettings};
use crate::replay::DEFAULT_MAX_PARENT_HOPS;
use crate::scanner::command::DEFAULT_SCANNER_EXECUTABLE;
use crate::scanner::{resolve_executable, ScannerSettings};
use crate::workspace::DEFAULT_FORK_BASE_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use super::args::Args;

pub const CONFIG_DIR_NAME: &str = "Commitscan";
pub const CONFIG_FILE_NAME: &str = "commitscan.toml";

pub const ENV_GITHUB_TOKENS: &str = "GITHUB_TOKENS";
pub const ENV_SONAR_TOKEN: &str = "SONAR_TOKEN";
pub const ENV_SONAR_SCANNER_HOME: &str = "SONAR_SCANNER_HOME";

const LOG_FORMATS: [&str; 3] = ["text", "ext", "json"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The specified configuration file does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Could not read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    Parse { path: PathBuf, message: String },

    #[error("{message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl std::fmt::Display) -> Self {
        ConfigError::Invalid {
            key,
            message: format!("Invalid value for {}: {}", key, message),
        }
    }
}

impl ContextualError for ConfigError {
    fn is_user_actionable(&self) -> bool {
        self.user_message().is_some()
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ConfigError::Parse { message, .. } | ConfigError::Invalid { message, .. } => {
                Some(message)
            }
            ConfigError::NotFound { .. } | ConfigError::Read { .. } => None,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GithubConfig {
    pub api_url: String,
    pub tokens: Vec<String>,
    pub min_cooldown_secs: i64,
    pub attempts_per_credential: usize,
    pub timeout_secs: u64,
    pub max_parent_hops: usize,
    pub fork_base_url: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            tokens: Vec::new(),
            min_cooldown_secs: DEFAULT_MIN_COOLDOWN_SECS,
            attempts_per_credential: DEFAULT_ATTEMPTS_PER_CREDENTIAL,
            timeout_secs: 30,
            max_parent_hops: DEFAULT_MAX_PARENT_HOPS,
            fork_base_url: DEFAULT_FORK_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub root: PathBuf,
    pub lock_timeout_secs: u64,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .map(|dir| dir.join("commitscan"))
                .unwrap_or_else(|| PathBuf::from("commitscan-workspaces")),
            lock_timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScannerConfig {
    pub instance: String,
    pub host: String,
    pub token: String,
    pub executable: String,
    pub timeout_secs: u64,
    pub extra_properties: Vec<String>,
    pub log_archive_dir: Option<PathBuf>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            instance: "default".to_string(),
            host: "http://localhost:9000".to_string(),
            token: String::new(),
            executable: DEFAULT_SCANNER_EXECUTABLE.to_string(),
            timeout_secs: 3600,
            extra_properties: Vec::new(),
            log_archive_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobsConfig {
    pub default_max_retries: u32,
    pub transient_retry_delay_secs: u64,
    pub running_stale_minutes: i64,
    pub queued_stale_minutes: i64,
    pub reconcile_interval_secs: u64,
    pub workers: usize,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            default_max_retries: 3,
            transient_retry_delay_secs: 60,
            running_stale_minutes: 15,
            queued_stale_minutes: 60,
            reconcile_interval_secs: 600,
            workers: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Empty, "none" or "-" disables file logging
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> Option<&Path> {
        self.file.as_deref().filter(|path| {
            let text = path.to_string_lossy();
            !(text.is_empty() || text == "-" || text.eq_ignore_ascii_case("none"))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub github: GithubConfig,
    pub workspace: WorkspaceConfig,
    pub scanner: ScannerConfig,
    pub jobs: JobsConfig,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// `<config dir>/Commitscan/commitscan.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load the explicit file (which must exist) or the default file if present
    pub async fn load(config_file: Option<&Path>) -> ConfigResult<Self> {
        let path = match config_file {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
        let config = Self::from_toml(&contents, &path)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(contents: &str, path: &Path) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: format!("Error parsing configuration file {}: {}", path.display(), e),
        })
    }

    /// Apply credential and scanner environment variables through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(tokens) = lookup(ENV_GITHUB_TOKENS) {
            self.github.tokens.extend(
                tokens
                    .split(',')
                    .map(str::trim)
                    .filter(|token| !token.is_empty())
                    .map(String::from),
            );
        }
        if let Some(token) = lookup(ENV_SONAR_TOKEN).filter(|token| !token.trim().is_empty()) {
            self.scanner.token = token.trim().to_string();
        }
        if let Some(home) = lookup(ENV_SONAR_SCANNER_HOME) {
            self.scanner.executable =
                resolve_executable(Some(&self.scanner.executable), Some(&home))
                    .to_string_lossy()
                    .into_owned();
        }
    }

    /// Command-line logging overrides
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if let Some(format) = &args.log_format {
            self.logging.format = format.clone();
        }
        if let Some(file) = &args.log_file {
            self.logging.file = Some(file.clone());
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if log::LevelFilter::from_str(&self.logging.level).is_err() {
            return Err(ConfigError::invalid("logging.level", &self.logging.level));
        }
        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(ConfigError::invalid(
                "logging.format",
                format!("'{}' (expected one of {})", self.logging.format, LOG_FORMATS.join(", ")),
            ));
        }
        if self.scanner.instance.trim().is_empty() {
            return Err(ConfigError::invalid("scanner.instance", "must not be empty"));
        }
        if self.scanner.host.trim().is_empty() {
            return Err(ConfigError::invalid("scanner.host", "must not be empty"));
        }
        if let Some(property) = self
            .scanner
            .extra_properties
            .iter()
            .find(|property| !property.contains('='))
        {
            return Err(ConfigError::invalid(
                "scanner.extra_properties",
                format!("'{}' is not key=value", property),
            ));
        }
        if self.jobs.workers == 0 {
            return Err(ConfigError::invalid("jobs.workers", "must be at least 1"));
        }
        if self.jobs.default_max_retries == 0 {
            return Err(ConfigError::invalid("jobs.default_max_retries", "must be at least 1"));
        }
        if self.jobs.running_stale_minutes <= 0 || self.jobs.queued_stale_minutes <= 0 {
            return Err(ConfigError::invalid("jobs", "stale thresholds must be positive"));
        }
        if self.jobs.reconcile_interval_secs == 0 {
            return Err(ConfigError::invalid("jobs.reconcile_interval_secs", "must be positive"));
        }
        if self.github.attempts_per_credential == 0 {
            return Err(ConfigError::invalid("github.attempts_per_credential", "must be at least 1"));
        }
        if self.github.max_parent_hops == 0 {
            return Err(ConfigError::invalid("github.max_parent_hops", "must be at least 1"));
        }
        Ok(())
    }

    pub fn scanner_settings(&self) -> ScannerSettings {
        let mut settings = ScannerSettings::new(&self.scanner.host, &self.scanner.token);
        settings.executable = PathBuf::from(&self.scanner.executable);
        settings.timeout = Duration::from_secs(self.scanner.timeout_secs);
        settings.extra_properties = self.scanner.extra_properties.clone();
        settings
    }

    pub fn coordinator_settings(&self) -> CoordinatorSettings {
        CoordinatorSettings {
            default_max_retries: self.jobs.default_max_retries,
            transient_retry_delay: Duration::from_secs(self.jobs.transient_retry_delay_secs),
        }
    }

    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            running_stale: chrono::Duration::minutes(self.jobs.running_stale_minutes),
            queued_stale: chrono::Duration::minutes(self.jobs.queued_stale_minutes),
            interval: Duration::from_secs(self.jobs.reconcile_interval_secs),
        }
    }
}
