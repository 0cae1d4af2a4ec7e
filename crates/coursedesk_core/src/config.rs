//! Runtime configuration for the course desk core.
//!
//! # Responsibility
//! - Describe storage, logging and persistence-timeout settings.
//! - Load them from JSON with per-field defaults.
//!
//! # Invariants
//! - Missing fields fall back to `AppConfig::default()` values.
//! - `persist_timeout_ms` is never zero after validation.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default bound on one persistence batch or reload.
pub const DEFAULT_PERSIST_TIMEOUT_MS: u64 = 10_000;

/// Application-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite file. `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` skips file logging.
    pub log_dir: Option<String>,
    /// Upper bound for one rank persistence batch or list reload.
    pub persist_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            persist_timeout_ms: DEFAULT_PERSIST_TIMEOUT_MS,
        }
    }
}

impl AppConfig {
    /// Parses configuration from a JSON document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::from_json_str(&raw)
    }

    /// Rejects values that would make the reorder service unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.persist_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "persist_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Derives reorder service settings.
    pub fn reorder(&self) -> ReorderConfig {
        ReorderConfig {
            persist_timeout: Duration::from_millis(self.persist_timeout_ms),
        }
    }
}

/// Settings of one reorder service instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderConfig {
    /// A hung persistence call is treated as failed after this long.
    pub persist_timeout: Duration,
}

impl Default for ReorderConfig {
    fn default() -> Self {
        Self {
            persist_timeout: Duration::from_millis(DEFAULT_PERSIST_TIMEOUT_MS),
        }
    }
}

/// Configuration loading errors.
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
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, DEFAULT_PERSIST_TIMEOUT_MS};
    use std::time::Duration;

    #[test]
    fn missing_fields_use_defaults() {
        let config = AppConfig::from_json_str(r#"{"log_level":"warn"}"#).unwrap();
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.db_path, None);
        assert_eq!(config.persist_timeout_ms, DEFAULT_PERSIST_TIMEOUT_MS);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = AppConfig::from_json_str(r#"{"persist_timeout_ms":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn reorder_settings_follow_timeout() {
        let config = AppConfig::from_json_str(r#"{"persist_timeout_ms":250}"#).unwrap();
        assert_eq!(
            config.reorder().persist_timeout,
            Duration::from_millis(250)
        );
    }
}
