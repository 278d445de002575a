//! Configuration for the scriptdeck console.
//!
//! The file lives at `~/.scriptdeck/config.toml` (or wherever
//! `SCRIPTDECK_CONFIG` points). Every section is optional; a missing file means
//! defaults everywhere. [`Settings::resolve`] turns the raw file plus
//! environment overrides into validated runtime settings.
//!
//! ```toml
//! [server]
//! base_url = "http://127.0.0.1:5000"
//!
//! [stream]
//! retry_delay_secs = 5
//! idle_timeout_secs = 45
//!
//! [logs]
//! buffer_capacity = 200
//! backlog_limit = 100
//!
//! [[scripts]]
//! id = "follower"
//! name = "组合跟踪"
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use scriptdeck_types::{CatalogError, ScriptCatalog, ScriptEntry};
use thiserror::Error;
use url::Url;

pub const CONFIG_PATH_ENV: &str = "SCRIPTDECK_CONFIG";
pub const BASE_URL_ENV: &str = "SCRIPTDECK_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;
/// The backend heartbeats every 15s; three missed beats means the stream is dead.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 45;
pub const DEFAULT_BUFFER_CAPACITY: usize = 200;
pub const DEFAULT_BACKLOG_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct DeckConfig {
    pub server: Option<ServerConfig>,
    pub stream: Option<StreamConfig>,
    pub logs: Option<LogsConfig>,
    /// Replaces the built-in script table when non-empty.
    #[serde(default)]
    pub scripts: Vec<ScriptConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Supports `${ENV_VAR}` expansion.
    pub base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamConfig {
    pub retry_delay_secs: Option<u64>,
    pub idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LogsConfig {
    pub buffer_capacity: Option<usize>,
    pub backlog_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptConfig {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid base URL `{value}`: {source}")]
    BaseUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
    #[error("invalid script table: {0}")]
    Scripts(#[from] CatalogError),
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl DeckConfig {
    /// Load from the default location. `Ok(None)` when no file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(Some(config)),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }
}

pub fn config_path() -> Option<PathBuf> {
    if let Ok(explicit) = env::var(CONFIG_PATH_ENV)
        && !explicit.trim().is_empty()
    {
        return Some(PathBuf::from(explicit));
    }
    dirs::home_dir().map(|home| home.join(".scriptdeck").join("config.toml"))
}

/// Values taken from the process environment, applied over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub base_url: Option<String>,
}

impl Overrides {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            base_url: env::var(BASE_URL_ENV)
                .ok()
                .filter(|value| !value.trim().is_empty()),
        }
    }
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: Url,
    pub retry_delay: Duration,
    pub idle_timeout: Duration,
    pub buffer_capacity: usize,
    pub backlog_limit: usize,
    pub catalog: ScriptCatalog,
}

impl Settings {
    pub fn resolve(
        config: Option<&DeckConfig>,
        overrides: &Overrides,
    ) -> Result<Self, ConfigError> {
        let server = config.and_then(|c| c.server.as_ref());
        let stream = config.and_then(|c| c.stream.as_ref());
        let logs = config.and_then(|c| c.logs.as_ref());

        let raw_url = overrides
            .base_url
            .clone()
            .or_else(|| server.and_then(|s| s.base_url.as_deref()).map(expand_env_vars))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = parse_base_url(&raw_url)?;

        let retry_delay_secs = stream
            .and_then(|s| s.retry_delay_secs)
            .unwrap_or(DEFAULT_RETRY_DELAY_SECS);
        if retry_delay_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.retry_delay_secs",
                reason: "must be at least 1",
            });
        }

        let idle_timeout_secs = stream
            .and_then(|s| s.idle_timeout_secs)
            .unwrap_or(DEFAULT_IDLE_TIMEOUT_SECS);
        if idle_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "stream.idle_timeout_secs",
                reason: "must be at least 1",
            });
        }

        let buffer_capacity = logs
            .and_then(|l| l.buffer_capacity)
            .unwrap_or(DEFAULT_BUFFER_CAPACITY);
        if buffer_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "logs.buffer_capacity",
                reason: "must be at least 1",
            });
        }

        let backlog_limit = logs
            .and_then(|l| l.backlog_limit)
            .unwrap_or(DEFAULT_BACKLOG_LIMIT);

        let catalog = match config.map(|c| c.scripts.as_slice()) {
            Some(scripts) if !scripts.is_empty() => ScriptCatalog::new(
                scripts
                    .iter()
                    .map(|s| ScriptEntry::new(s.id.trim(), s.name.trim()))
                    .collect(),
            )?,
            _ => ScriptCatalog::builtin(),
        };

        Ok(Self {
            base_url,
            retry_delay: Duration::from_secs(retry_delay_secs),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            buffer_capacity,
            backlog_limit,
            catalog,
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    // Url::join drops the last path segment unless the base ends with '/'.
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).map_err(|source| ConfigError::BaseUrl {
        value: raw.to_string(),
        source,
    })
}

/// Expand `${VAR}` references; unset variables become empty.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + len];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + len + 1..];
    }

    out.push_str(rest);
    out
}
