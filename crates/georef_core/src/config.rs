//! Runtime configuration for registry processes.
//!
//! # Responsibility
//! - Decode the JSON configuration file.
//! - Reject page limits that would make every listing fail.

use crate::logging::default_log_level;
use crate::service::query_service::PageLimits;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "cannot read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "malformed config: {err}"),
            Self::Invalid(details) => write!(f, "invalid config: {details}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Paths and limits for one registry deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Entity store database file.
    pub store_path: PathBuf,
    /// Search index database file.
    pub index_path: PathBuf,
    #[serde(default = "default_level")]
    pub log_level: String,
    /// Absolute directory for rolling log files; stderr when absent.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    #[serde(default = "max_page_size")]
    pub max_page_size: u64,
}

fn default_level() -> String {
    default_log_level().to_string()
}

fn default_page_size() -> u64 {
    PageLimits::default().default_page_size
}

fn max_page_size() -> u64 {
    PageLimits::default().max_page_size
}

impl RegistryConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid(
                "max_page_size must be greater than zero".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        Ok(())
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
        }
    }
}
