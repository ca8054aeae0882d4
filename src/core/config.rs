/*
 * Manages the client's configuration: where the task-management API lives and
 * how long fetched data stays fresh. Settings are read from `config.json` in the
 * per-user local configuration directory; a missing file yields defaults, and
 * the `TASK_MANAGER_API_BASE_URL` environment variable overrides the base URL.
 *
 * It uses a trait-based approach (`ConfigManagerOperations`) so tests and
 * alternative frontends can supply configuration without touching the disk.
 */
use crate::core::path_utils;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILENAME: &str = "config.json";
pub const API_BASE_URL_ENV: &str = "TASK_MANAGER_API_BASE_URL";

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    NoProjectDirectory,
    Parse(serde_json::Error),
}

impl From<io::Error> for ConfigError {
    fn from(err: io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Configuration I/O error: {e}"),
            ConfigError::NoProjectDirectory => {
                write!(f, "Could not determine project directory for configuration")
            }
            ConfigError::Parse(e) => write!(f, "Configuration file is malformed: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::NoProjectDirectory => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /* Base URL of the task-management API, without a trailing slash. */
    pub api_base_url: String,
    /* Timeout applied to every HTTP request. */
    pub request_timeout_secs: u64,
    /* Age after which a cached remote resource is refetched on the next request. */
    pub reports_stale_after_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            api_base_url: "http://localhost:3000".to_string(),
            request_timeout_secs: 30,
            reports_stale_after_secs: 60,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.reports_stale_after_secs)
    }

    // Applies an override for the base URL; blank values are ignored.
    fn with_base_url_override(mut self, base_url: Option<String>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            log::debug!("AppConfig: Base URL overridden by {API_BASE_URL_ENV}: {url}");
            self.api_base_url = url;
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        self
    }
}

pub trait ConfigManagerOperations: Send + Sync {
    fn load_app_config(&self, app_name: &str) -> Result<AppConfig>;
}

pub struct CoreConfigManager {
    // When set, the config file is read from this directory instead of the per-user one.
    config_dir_override: Option<PathBuf>,
}

impl CoreConfigManager {
    pub fn new() -> Self {
        CoreConfigManager {
            config_dir_override: None,
        }
    }

    pub fn with_config_dir(config_dir: &Path) -> Self {
        CoreConfigManager {
            config_dir_override: Some(config_dir.to_path_buf()),
        }
    }

    fn config_dir(&self, app_name: &str) -> Result<PathBuf> {
        match &self.config_dir_override {
            Some(dir) => Ok(dir.clone()),
            None => path_utils::get_base_app_config_local_dir(app_name)
                .ok_or(ConfigError::NoProjectDirectory),
        }
    }

    fn read_config_file(file_path: &Path) -> Result<AppConfig> {
        if !file_path.exists() {
            log::debug!("CoreConfigManager: No config file at {file_path:?}; using defaults.");
            return Ok(AppConfig::default());
        }
        let contents = fs::read_to_string(file_path)?;
        if contents.trim().is_empty() {
            log::debug!("CoreConfigManager: Config file {file_path:?} is empty; using defaults.");
            return Ok(AppConfig::default());
        }
        let config: AppConfig = serde_json::from_str(&contents)?;
        log::debug!("CoreConfigManager: Loaded configuration from {file_path:?}.");
        Ok(config)
    }
}

impl Default for CoreConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManagerOperations for CoreConfigManager {
    fn load_app_config(&self, app_name: &str) -> Result<AppConfig> {
        log::trace!("CoreConfigManager: Loading configuration for app '{app_name}'");
        let file_path = self.config_dir(app_name)?.join(CONFIG_FILENAME);
        let config = Self::read_config_file(&file_path)?;
        Ok(config.with_base_url_override(std::env::var(API_BASE_URL_ENV).ok()))
    }
}

/*
 * Loads the configuration through `manager`, falling back to defaults when it
 * cannot be read. The environment override applies either way.
 */
pub fn load_config_or_defaults(
    manager: &dyn ConfigManagerOperations,
    app_name: &str,
) -> AppConfig {
    config_or_defaults(
        manager.load_app_config(app_name),
        std::env::var(API_BASE_URL_ENV).ok(),
    )
}

fn config_or_defaults(loaded: Result<AppConfig>, base_url_override: Option<String>) -> AppConfig {
    loaded.unwrap_or_else(|e| {
        log::warn!("AppConfig: Could not load configuration, using defaults: {e}");
        AppConfig::default().with_base_url_override(base_url_override)
    })
}
