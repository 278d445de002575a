//! Presentation callbacks and user-facing notices.

use scriptdeck_types::{BufferId, ChannelState, LogRecord, ScriptId, ScriptState};
use serde_json::Value;

/// Severity of a transient notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// A short-lived message for the user (a toast, a status line).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

/// Callbacks the console invokes after its own state has been updated.
///
/// Every method defaults to a no-op so a presenter implements only what it
/// draws. Hooks run on the console's task and must not block.
pub trait ConsoleHooks {
    /// A record was appended to `buffer` (live or replayed).
    fn on_log_appended(&mut self, buffer: &BufferId, record: &LogRecord) {
        let _ = (buffer, record);
    }

    /// A script's running flag changed, or the script became known.
    fn on_state_changed(&mut self, id: &ScriptId, state: &ScriptState) {
        let _ = (id, state);
    }

    fn on_channel_status_changed(&mut self, state: ChannelState) {
        let _ = state;
    }

    fn on_buffer_cleared(&mut self, buffer: &BufferId) {
        let _ = buffer;
    }

    fn on_notice(&mut self, notice: &Notice) {
        let _ = notice;
    }

    /// Opaque backend configuration, fetched once at startup.
    fn on_config_loaded(&mut self, config: &Value) {
        let _ = config;
    }
}

impl ConsoleHooks for () {}
