//! Core domain types for scriptdeck.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory

mod ids;
mod sanitize;

pub use ids::{BufferId, ScriptId};
pub use sanitize::sanitize_log_line;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Source sentinel the backend uses for its own (non-script) log lines.
pub const SYSTEM_SOURCE: &str = "system";

// ============================================================================
// Log Records
// ============================================================================

/// Severity of a log record.
///
/// The backend writes `warning` for warnings in persisted history and `warn`
/// elsewhere; both map to [`LogLevel::Warn`]. Unrecognized strings degrade to
/// [`LogLevel::Info`] so a new level never costs us the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogLevel {
    #[default]
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Debug => "debug",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "warn" | "warning" => LogLevel::Warn,
            "error" | "err" => LogLevel::Error,
            "debug" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<LogLevel> for String {
    fn from(value: LogLevel) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_source() -> String {
    SYSTEM_SOURCE.to_string()
}

/// One log line, either replayed from history or pushed live.
///
/// Accepts both the canonical field names and the backend's wire names
/// (`script` for `source`, `time` for `timestamp`). Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    #[serde(alias = "script", default = "default_source")]
    source: String,
    #[serde(default)]
    level: LogLevel,
    #[serde(alias = "time", default)]
    timestamp: String,
    message: String,
    /// Row id; present only on records replayed from persisted history.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
}

impl LogRecord {
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        level: LogLevel,
        timestamp: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            level,
            timestamp: timestamp.into(),
            message: message.into(),
            id: None,
        }
    }

    #[must_use]
    pub fn system(
        level: LogLevel,
        timestamp: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(SYSTEM_SOURCE, level, timestamp, message)
    }

    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.level
    }

    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        self.source == SYSTEM_SOURCE
    }
}

// ============================================================================
// Script State
// ============================================================================

/// Run state of one script as pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptState {
    pub id: ScriptId,
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ScriptState {
    #[must_use]
    pub fn new(id: impl Into<ScriptId>, running: bool) -> Self {
        Self {
            id: id.into(),
            running,
            name: None,
        }
    }
}

/// Body of a `script_status` push: the full known set of scripts.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusPayload {
    pub scripts: Vec<ScriptState>,
}

// ============================================================================
// Event Channel
// ============================================================================

/// Connection state of the server-push stream.
///
/// Transitions: `Connecting -> Open` on success, `Open -> Retrying -> Connecting`
/// on any failure. There is no terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelState {
    Connecting,
    Open,
    Retrying,
}

impl ChannelState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChannelState::Connecting => "connecting",
            ChannelState::Open => "open",
            ChannelState::Retrying => "retrying",
        }
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed event delivered by the event channel to its subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Log(LogRecord),
    ScriptStatus(Vec<ScriptState>),
    Status(ChannelState),
}

// ============================================================================
// Script Catalog
// ============================================================================

/// A known script and the display name its log lines are tagged with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub id: ScriptId,
    pub display_name: String,
}

impl ScriptEntry {
    #[must_use]
    pub fn new(id: impl Into<ScriptId>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("script catalog must not be empty")]
    Empty,
    #[error("duplicate script id `{0}`")]
    DuplicateId(ScriptId),
    #[error("duplicate display name `{0}`")]
    DuplicateName(String),
    #[error("`{0}` is reserved for the system log")]
    Reserved(String),
}

/// The static display-name table mapping log sources back to script ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCatalog {
    entries: Vec<ScriptEntry>,
}

impl ScriptCatalog {
    pub fn new(entries: Vec<ScriptEntry>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for entry in &entries {
            if entry.id.as_str() == SYSTEM_SOURCE {
                return Err(CatalogError::Reserved(entry.id.to_string()));
            }
            if entry.display_name == SYSTEM_SOURCE {
                return Err(CatalogError::Reserved(entry.display_name.clone()));
            }
            if !ids.insert(entry.id.clone()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
            if !names.insert(entry.display_name.as_str()) {
                return Err(CatalogError::DuplicateName(entry.display_name.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The scripts the backend ships with.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            entries: vec![
                ScriptEntry::new("auto_track", "自动跟踪同步"),
                ScriptEntry::new("simulator", "模拟仓操作"),
                ScriptEntry::new("follower", "组合跟踪"),
                ScriptEntry::new("trader", "交易演示"),
            ],
        }
    }

    /// Reverse lookup: which script logs under this display name.
    #[must_use]
    pub fn id_for_display_name(&self, name: &str) -> Option<&ScriptId> {
        self.entries
            .iter()
            .find(|entry| entry.display_name == name)
            .map(|entry| &entry.id)
    }

    #[must_use]
    pub fn display_name(&self, id: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.id.as_str() == id)
            .map(|entry| entry.display_name.as_str())
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| entry.id.as_str() == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ScriptId> {
        self.entries.iter().map(|entry| &entry.id)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScriptEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ScriptCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
