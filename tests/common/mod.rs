//! Shared test utilities and fixtures
//!
//! A wiremock server stands in for the backend: JSON endpoints plus an
//! event-stream body that closes after its last frame.

#![allow(dead_code)]

use std::time::Duration;

use scriptdeck_client::{ChannelConfig, ConsoleApi, Subscription, retry::RetryConfig};
use scriptdeck_core::{ConsoleHooks, Notice};
use scriptdeck_types::{BufferId, ChannelEvent, ChannelState, LogRecord, ScriptId, ScriptState};
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Upper bound for anything a test waits on.
pub const WAIT: Duration = Duration::from_secs(5);

/// A client of its own per test: pooled connections must not outlive the
/// runtime that opened them.
pub fn api(server: &MockServer) -> ConsoleApi {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    ConsoleApi::with_client(reqwest::Client::new(), base).with_retry_config(RetryConfig::none())
}

/// Short delays so reconnects happen within a test.
pub fn fast_channel() -> ChannelConfig {
    ChannelConfig {
        retry_delay: Duration::from_millis(50),
        idle_timeout: Duration::from_secs(2),
        ..ChannelConfig::default()
    }
}

pub fn frame(event: &str, data: &Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

pub fn log_frame(source: &str, timestamp: &str, message: &str) -> String {
    frame(
        "log",
        &json!({"source": source, "level": "info", "timestamp": timestamp, "message": message}),
    )
}

pub fn status_frame(scripts: &[(&str, bool)]) -> String {
    let scripts: Vec<Value> = scripts
        .iter()
        .map(|(id, running)| json!({"id": id, "running": running}))
        .collect();
    frame("script_status", &json!({"scripts": scripts}))
}

fn stream_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

/// Serve `body` on the next stream request only.
pub async fn mount_stream_once(server: &MockServer, frames: &[String]) {
    Mock::given(method("GET"))
        .and(path("/api/logs/stream"))
        .respond_with(stream_response(frames.concat()))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Serve `body` on every stream request.
pub async fn mount_stream(server: &MockServer, frames: &[String]) {
    Mock::given(method("GET"))
        .and(path("/api/logs/stream"))
        .respond_with(stream_response(frames.concat()))
        .mount(server)
        .await;
}

pub async fn mount_config(server: &MockServer, config: Value) {
    let mut body = json!({"success": true});
    body["config"] = config;
    Mock::given(method("GET"))
        .and(path("/api/config"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

pub async fn mount_history(server: &MockServer, logs: Value) {
    Mock::given(method("GET"))
        .and(path("/api/logs/history"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"success": true, "logs": logs})),
        )
        .mount(server)
        .await;
}

pub async fn mount_post(server: &MockServer, route: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Receive until `pred` matches, failing the test after [`WAIT`].
pub async fn recv_until<F>(events: &mut Subscription, mut pred: F) -> Vec<ChannelEvent>
where
    F: FnMut(&ChannelEvent) -> bool,
{
    let mut seen = Vec::new();
    tokio::time::timeout(WAIT, async {
        while let Some(event) = events.recv().await {
            let done = pred(&event);
            seen.push(event);
            if done {
                return;
            }
        }
        panic!("channel dropped");
    })
    .await
    .unwrap_or_else(|_| panic!("timed out; received so far: {seen:?}"));
    seen
}

pub fn is_log(message: &str) -> impl FnMut(&ChannelEvent) -> bool + '_ {
    move |event| matches!(event, ChannelEvent::Log(record) if record.message() == message)
}

/// Paths of the requests the server saw, in arrival order.
pub async fn request_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.url.path().to_string())
        .collect()
}

/// Console callbacks, flattened to comparable values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seen {
    Appended(BufferId, String),
    State(ScriptId, bool),
    Channel(ChannelState),
    Cleared(BufferId),
    Notice(Notice),
    Config(Value),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub seen: Vec<Seen>,
}

impl Recorder {
    pub fn notices(&self) -> Vec<&Notice> {
        self.seen
            .iter()
            .filter_map(|seen| match seen {
                Seen::Notice(notice) => Some(notice),
                _ => None,
            })
            .collect()
    }

    pub fn appended(&self) -> Vec<(&BufferId, &str)> {
        self.seen
            .iter()
            .filter_map(|seen| match seen {
                Seen::Appended(buffer, message) => Some((buffer, message.as_str())),
                _ => None,
            })
            .collect()
    }
}

impl ConsoleHooks for Recorder {
    fn on_log_appended(&mut self, buffer: &BufferId, record: &LogRecord) {
        self.seen
            .push(Seen::Appended(buffer.clone(), record.message().to_string()));
    }

    fn on_state_changed(&mut self, id: &ScriptId, state: &ScriptState) {
        self.seen.push(Seen::State(id.clone(), state.running));
    }

    fn on_channel_status_changed(&mut self, state: ChannelState) {
        self.seen.push(Seen::Channel(state));
    }

    fn on_buffer_cleared(&mut self, buffer: &BufferId) {
        self.seen.push(Seen::Cleared(buffer.clone()));
    }

    fn on_notice(&mut self, notice: &Notice) {
        self.seen.push(Seen::Notice(notice.clone()));
    }

    fn on_config_loaded(&mut self, config: &Value) {
        self.seen.push(Seen::Config(config.clone()));
    }
}
