use std::borrow::Borrow;
use std::fmt;

/// Identifier of a managed background script (e.g. `follower`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ScriptId(String);

impl ScriptId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScriptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ScriptId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScriptId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Display buffer a log record lands in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BufferId {
    System,
    Script(ScriptId),
}

impl BufferId {
    /// Parse a user-supplied buffer name. `"system"` is the system buffer,
    /// anything else names a script buffer.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw == crate::SYSTEM_SOURCE {
            Self::System
        } else {
            Self::Script(ScriptId::new(raw))
        }
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System => f.write_str(crate::SYSTEM_SOURCE),
            Self::Script(id) => write!(f, "{id}"),
        }
    }
}
