// src/config.rs
//! Engine tuning loaded from `jobpilot.yaml`.
//!
//! The file is optional: every field has a default, so an empty or missing
//! file yields the stock engine. An explicitly requested file must exist.

use crate::browser::Locator;
use crate::utils::resolve_path;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "jobpilot.yaml";
pub const DEFAULT_LOGIN_PATTERN: &str = r"(?i)login|sign[-_]?in";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("invalid login pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("unknown locator target '{0}'")]
    UnknownTarget(String),
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub locator_wait_ms: u64,
    pub optional_wait_ms: u64,
    pub poll_interval_ms: u64,
    pub page_load_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub max_login_attempts: u32,
    pub login_pattern: String,
    pub scroll_passes: u32,
    pub export_path: PathBuf,
    pub log_path: PathBuf,
    pub user_agent: String,
    pub site: SiteConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            locator_wait_ms: 5_000,
            optional_wait_ms: 1_000,
            poll_interval_ms: 100,
            page_load_timeout_secs: 30,
            settle_delay_ms: 1_500,
            max_login_attempts: 3,
            login_pattern: DEFAULT_LOGIN_PATTERN.to_string(),
            scroll_passes: 3,
            export_path: PathBuf::from(crate::export::DEFAULT_EXPORT_PATH),
            log_path: PathBuf::from("/tmp/jobpilot.log"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            site: SiteConfig::default(),
        }
    }
}

/// Where the board keeps its login and search pages, plus locator overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub login_path: String,
    pub search_path: String,
    /// Target name (e.g. `apply_button`) to the candidates replacing its defaults.
    pub locators: HashMap<String, Vec<Locator>>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            login_path: "/login".to_string(),
            search_path: "/jobs".to_string(),
            locators: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load `path`, or `jobpilot.yaml` in the working directory when it exists.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => {
                let path = resolve(path)?;
                if !path.exists() {
                    return Err(ConfigError::NotFound(path));
                }
                Self::load_from_file(&path)?
            }
            None => {
                let path = resolve(Path::new(DEFAULT_CONFIG_FILE))?;
                if path.exists() {
                    Self::load_from_file(&path)?
                } else {
                    app_log!(debug, "No {} found, using defaults", DEFAULT_CONFIG_FILE);
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        app_log!(info, "Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_login_attempts == 0 {
            return Err(ConfigError::Invalid("max_login_attempts must be at least 1".into()));
        }
        if self.locator_wait_ms == 0 {
            return Err(ConfigError::Invalid("locator_wait_ms must be positive".into()));
        }
        if self.page_load_timeout_secs == 0 {
            return Err(ConfigError::Invalid("page_load_timeout_secs must be positive".into()));
        }
        self.login_regex()?;
        Ok(())
    }

    pub fn login_regex(&self) -> Result<Regex, ConfigError> {
        Ok(Regex::new(&self.login_pattern)?)
    }

    pub fn locator_wait(&self) -> Duration {
        Duration::from_millis(self.locator_wait_ms)
    }

    pub fn optional_wait(&self) -> Duration {
        Duration::from_millis(self.optional_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn resolve(path: &Path) -> Result<PathBuf, ConfigError> {
    resolve_path(path).map_err(|e| ConfigError::Invalid(format!("{:#}", e)))
}
