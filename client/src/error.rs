use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Why the event stream connection ended or never opened.
///
/// Every variant is recoverable: the channel schedules a reconnect.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to open event stream: {0}")]
    Connect(#[source] reqwest::Error),
    #[error("event stream rejected with HTTP {0}")]
    Status(StatusCode),
    #[error("event stream read failed: {0}")]
    Stream(#[source] reqwest::Error),
    #[error("event stream idle for {}s", .0.as_secs())]
    IdleTimeout(Duration),
    #[error("event stream frame exceeded {0} bytes")]
    BufferOverflow(usize),
    #[error("event stream closed by server")]
    Closed,
}

/// Default text for a rejection that carries no message.
pub const DEFAULT_REJECTION: &str = "operation failed";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("request failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    /// The backend answered `{"success": false}`; the text is shown verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("base URL cannot carry a path")]
    CannotBeABase,
}

impl ApiError {
    /// A backend rejection, as opposed to a failure to get an answer at all.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// One line for the console. HTTP failures keep only the status line;
    /// the body stays in the log.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            Self::Status { status, .. } => format!("HTTP {status}"),
            other => other.to_string(),
        }
    }
}
