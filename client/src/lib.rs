//! Network layer of the scriptdeck console.
//!
//! # Architecture
//!
//! - [`ConsoleApi`] - request/response calls against the backend's JSON API
//! - [`EventChannel`] - the persistent server-push stream, with reconnect
//! - [`sse`] - incremental `text/event-stream` decoding
//! - [`retry`] - backoff policy for idempotent reads
//!
//! The event channel delivers typed [`ChannelEvent`]s through a
//! [`Subscription`]; it owns its stream task and never terminates on its own.
//!
//! # Error Handling
//!
//! Stream failures never surface as errors to the subscriber. They show up as
//! a `Status(Retrying)` event followed by a reconnect. API calls return
//! [`ApiError`], which keeps backend rejections (`success: false`) apart from
//! transport failures.
//!
//! [`ChannelEvent`]: scriptdeck_types::ChannelEvent

pub mod api;
pub mod channel;
mod error;
pub mod retry;
pub mod sse;

use std::sync::OnceLock;
use std::time::Duration;

pub use api::{ConsoleApi, HistoryQuery};
pub use channel::{
    ChannelConfig, ChannelMachine, Connector, EventChannel, FrameStream, HttpConnector,
    Subscription,
};
pub use error::{ApiError, ChannelError, DEFAULT_REJECTION};
pub use scriptdeck_types;

const CONNECT_TIMEOUT_SECS: u64 = 10;

// reqwest only exposes the keepalive idle time; interval/retries use platform defaults.
const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 8;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

/// Shared HTTP client.
///
/// Carries no overall request timeout: the event stream stays open
/// indefinitely. Plain requests set their own timeout.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build tuned HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::new()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!("scriptdeck/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// Read an error response body, truncated to a sane size.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
