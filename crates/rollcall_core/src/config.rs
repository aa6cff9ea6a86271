//! Runtime configuration for core and its hosts.
//!
//! # Invariants
//! - Every field has a default, so an empty JSON object is a valid config.
//! - `validate()` runs after every load.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_SERVER_DB_FILE: &str = "rollcall_server.sqlite3";
const DEFAULT_CLIENT_DB_FILE: &str = "rollcall_client.sqlite3";
const DEFAULT_PAGE_LIMIT: u32 = 500;
const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Offline replay tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Upper bound on concurrently outstanding submissions. `1` replays
    /// strictly one after another.
    pub max_in_flight: usize,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

/// Top-level configuration file shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub server_db_path: PathBuf,
    pub client_db_path: PathBuf,
    /// Maximum events returned by one paged delta fetch.
    pub page_limit: u32,
    pub replay: ReplayConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            server_db_path: PathBuf::from(DEFAULT_SERVER_DB_FILE),
            client_db_path: PathBuf::from(DEFAULT_CLIENT_DB_FILE),
            page_limit: DEFAULT_PAGE_LIMIT,
            replay: ReplayConfig::default(),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_limit == 0 {
            return Err(ConfigError::Invalid(
                "page_limit must be at least 1".to_string(),
            ));
        }
        if self.replay.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "replay.max_in_flight must be at least 1".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

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
            Self::Parse(err) => write!(f, "malformed config: {err}"),
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
    use super::{ConfigError, CoreConfig};

    #[test]
    fn empty_object_yields_defaults() {
        let config = CoreConfig::from_json_str("{}").expect("empty config should load");
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.replay.max_in_flight, 4);
    }

    #[test]
    fn partial_replay_section_keeps_other_defaults() {
        let config =
            CoreConfig::from_json_str(r#"{"replay": {"max_in_flight": 1}, "page_limit": 50}"#)
                .expect("partial config should load");
        assert_eq!(config.replay.max_in_flight, 1);
        assert_eq!(config.page_limit, 50);
        assert_eq!(config.server_db_path, CoreConfig::default().server_db_path);
    }

    #[test]
    fn rejects_zero_limits_and_relative_log_dir() {
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"page_limit": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"replay": {"max_in_flight": 0}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            CoreConfig::from_json_str(r#"{"log_dir": "logs/dev"}"#),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn reports_malformed_json() {
        assert!(matches!(
            CoreConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
