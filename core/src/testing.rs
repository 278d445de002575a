//! In-memory doubles shared by the unit tests.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::StreamExt;
use reqwest::StatusCode;
use scriptdeck_client::{ApiError, ChannelError, Connector, FrameStream};
use scriptdeck_types::{BufferId, ChannelState, LogRecord, ScriptId, ScriptState};
use serde_json::{Value, json};

use crate::backend::Backend;
use crate::hooks::{ConsoleHooks, Notice};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    FetchConfig,
    FetchHistory(usize),
    ClearHistory,
    Start(ScriptId),
    Stop(ScriptId),
    Connect,
}

pub(crate) type Journal = Arc<Mutex<Vec<Call>>>;

#[derive(Debug, Clone, Default)]
enum Reply {
    #[default]
    Ok,
    Reject(String),
    Fail,
}

impl Reply {
    fn into_result<T>(self, value: T) -> Result<T, ApiError> {
        match self {
            Reply::Ok => Ok(value),
            Reply::Reject(text) => Err(ApiError::Rejected(text)),
            Reply::Fail => Err(ApiError::Status {
                status: StatusCode::SERVICE_UNAVAILABLE,
                body: String::new(),
            }),
        }
    }
}

pub(crate) struct FakeBackend {
    journal: Journal,
    config: Value,
    config_reply: Reply,
    history: Vec<LogRecord>,
    history_reply: Reply,
    script_reply: Reply,
    clear_reply: Reply,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            journal: Journal::default(),
            config: json!({"my_portfolio_code": "ZH000001"}),
            config_reply: Reply::Ok,
            history: Vec::new(),
            history_reply: Reply::Ok,
            script_reply: Reply::Ok,
            clear_reply: Reply::Ok,
        }
    }
}

impl FakeBackend {
    pub(crate) fn journal(&self) -> Journal {
        Arc::clone(&self.journal)
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.journal.lock().unwrap().clone()
    }

    pub(crate) fn with_history(mut self, history: Vec<LogRecord>) -> Self {
        self.history = history;
        self
    }

    pub(crate) fn fail_config(mut self) -> Self {
        self.config_reply = Reply::Fail;
        self
    }

    pub(crate) fn fail_history(mut self) -> Self {
        self.history_reply = Reply::Fail;
        self
    }

    pub(crate) fn reject_scripts(mut self, text: &str) -> Self {
        self.script_reply = Reply::Reject(text.to_string());
        self
    }

    pub(crate) fn fail_scripts(mut self) -> Self {
        self.script_reply = Reply::Fail;
        self
    }

    pub(crate) fn fail_clear(mut self) -> Self {
        self.clear_reply = Reply::Fail;
        self
    }

    fn record(&self, call: Call) {
        self.journal.lock().unwrap().push(call);
    }
}

impl Backend for FakeBackend {
    async fn fetch_config(&self) -> Result<Value, ApiError> {
        self.record(Call::FetchConfig);
        self.config_reply.clone().into_result(self.config.clone())
    }

    async fn fetch_history(&self, limit: usize) -> Result<Vec<LogRecord>, ApiError> {
        self.record(Call::FetchHistory(limit));
        self.history_reply.clone().into_result(self.history.clone())
    }

    async fn clear_history(&self) -> Result<(), ApiError> {
        self.record(Call::ClearHistory);
        self.clear_reply.clone().into_result(())
    }

    async fn start_script(&self, id: &ScriptId) -> Result<(), ApiError> {
        self.record(Call::Start(id.clone()));
        self.script_reply.clone().into_result(())
    }

    async fn stop_script(&self, id: &ScriptId) -> Result<(), ApiError> {
        self.record(Call::Stop(id.clone()));
        self.script_reply.clone().into_result(())
    }
}

/// Serves the given frames once per connect, then holds the stream open.
pub(crate) struct JournalConnector {
    journal: Journal,
    connections: Mutex<VecDeque<Vec<&'static [u8]>>>,
}

impl JournalConnector {
    pub(crate) fn new(journal: Journal, connections: Vec<Vec<&'static [u8]>>) -> Self {
        Self {
            journal,
            connections: Mutex::new(connections.into()),
        }
    }
}

impl Connector for JournalConnector {
    fn open(&self) -> impl Future<Output = Result<FrameStream, ChannelError>> + Send {
        self.journal.lock().unwrap().push(Call::Connect);
        let frames = self.connections.lock().unwrap().pop_front();
        async move {
            let Some(frames) = frames else {
                return Err(ChannelError::Status(StatusCode::SERVICE_UNAVAILABLE));
            };
            let chunks = futures_util::stream::iter(frames.into_iter().map(|f| Ok(f.to_vec())))
                .chain(futures_util::stream::pending());
            Ok(Box::pin(chunks) as FrameStream)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Recorded {
    Appended(BufferId, String),
    State(ScriptId, bool),
    Channel(ChannelState),
    Cleared(BufferId),
    Notice(Notice),
    Config(Value),
}

/// Hooks that write down every callback.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) events: Vec<Recorded>,
}

impl Recorder {
    pub(crate) fn notices(&self) -> Vec<Notice> {
        self.events
            .iter()
            .filter_map(|event| match event {
                Recorded::Notice(notice) => Some(notice.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ConsoleHooks for Recorder {
    fn on_log_appended(&mut self, buffer: &BufferId, record: &LogRecord) {
        self.events
            .push(Recorded::Appended(buffer.clone(), record.message().to_string()));
    }

    fn on_state_changed(&mut self, id: &ScriptId, state: &ScriptState) {
        self.events.push(Recorded::State(id.clone(), state.running));
    }

    fn on_channel_status_changed(&mut self, state: ChannelState) {
        self.events.push(Recorded::Channel(state));
    }

    fn on_buffer_cleared(&mut self, buffer: &BufferId) {
        self.events.push(Recorded::Cleared(buffer.clone()));
    }

    fn on_notice(&mut self, notice: &Notice) {
        self.events.push(Recorded::Notice(notice.clone()));
    }

    fn on_config_loaded(&mut self, config: &Value) {
        self.events.push(Recorded::Config(config.clone()));
    }
}
