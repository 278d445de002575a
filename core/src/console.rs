//! The client-side store: buffers, script state, channel status.
//!
//! [`Console`] is owned by a single task. Stream events and user commands are
//! applied to it in arrival order, and every mutation is followed by the
//! matching [`ConsoleHooks`] callback.

use std::fmt;

use scriptdeck_client::ApiError;
use scriptdeck_types::{
    BufferId, ChannelEvent, ChannelState, LogRecord, ScriptCatalog, ScriptId, ScriptState,
};
use serde_json::Value;
use thiserror::Error;

use crate::backend::Backend;
use crate::buffer::{BufferStore, BufferView};
use crate::hooks::{ConsoleHooks, Notice};
use crate::router::LogRouter;
use crate::state_table::{RunStatus, ScriptStateTable};

const REQUEST_FAILED: &str = "request failed";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown script `{0}`")]
    UnknownScript(ScriptId),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Which way a start/stop command went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptCommand {
    Start,
    Stop,
}

impl ScriptCommand {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ScriptCommand::Start => "start",
            ScriptCommand::Stop => "stop",
        }
    }

    const fn past_tense(self) -> &'static str {
        match self {
            ScriptCommand::Start => "started",
            ScriptCommand::Stop => "stopped",
        }
    }
}

impl fmt::Display for ScriptCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Console<H> {
    router: LogRouter,
    buffers: BufferStore,
    states: ScriptStateTable,
    channel: Option<ChannelState>,
    hooks: H,
}

impl<H: ConsoleHooks> Console<H> {
    #[must_use]
    pub fn new(catalog: ScriptCatalog, buffer_capacity: usize, hooks: H) -> Self {
        let buffers = BufferStore::new(&catalog, buffer_capacity);
        Self {
            router: LogRouter::new(catalog),
            buffers,
            states: ScriptStateTable::new(),
            channel: None,
            hooks,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &ScriptCatalog {
        self.router.catalog()
    }

    #[must_use]
    pub fn buffers(&self) -> &BufferStore {
        &self.buffers
    }

    #[must_use]
    pub fn view(&self, id: &BufferId) -> BufferView<'_> {
        self.buffers.view(id)
    }

    #[must_use]
    pub fn states(&self) -> &ScriptStateTable {
        &self.states
    }

    #[must_use]
    pub fn status(&self, id: &str) -> RunStatus {
        self.states.status(id)
    }

    /// Last reported stream state; `None` before the channel first reports.
    #[must_use]
    pub fn channel_state(&self) -> Option<ChannelState> {
        self.channel
    }

    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Route one record into its buffer.
    pub fn ingest(&mut self, record: LogRecord) -> BufferId {
        let id = self.router.route(&record);
        self.buffers.append(&id, record);
        if let Some(appended) = self.buffers.get(&id).and_then(|buffer| buffer.last()) {
            self.hooks.on_log_appended(&id, appended);
        }
        id
    }

    /// Ingest records in the order given. Returns how many were ingested.
    pub fn replay(&mut self, records: impl IntoIterator<Item = LogRecord>) -> usize {
        records.into_iter().map(|record| self.ingest(record)).count()
    }

    pub fn apply(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Log(record) => {
                self.ingest(record);
            }
            ChannelEvent::ScriptStatus(scripts) => self.apply_snapshot(scripts),
            ChannelEvent::Status(state) => {
                if self.channel != Some(state) {
                    tracing::debug!(%state, "Event channel status");
                }
                self.channel = Some(state);
                self.hooks.on_channel_status_changed(state);
            }
        }
    }

    fn apply_snapshot(&mut self, scripts: Vec<ScriptState>) {
        for id in self.states.apply_snapshot(scripts) {
            if let Some(state) = self.states.get(id.as_str()) {
                self.hooks.on_state_changed(&id, state);
            }
        }
    }

    pub fn notify(&mut self, notice: Notice) {
        if notice.is_error() {
            tracing::warn!(message = %notice.message, "Notice");
        } else {
            tracing::info!(message = %notice.message, "Notice");
        }
        self.hooks.on_notice(&notice);
    }

    pub fn config_loaded(&mut self, config: &Value) {
        self.hooks.on_config_loaded(config);
    }

    pub async fn start_script<B: Backend>(
        &mut self,
        backend: &B,
        id: &ScriptId,
    ) -> Result<(), CommandError> {
        self.run_command(backend, id, ScriptCommand::Start).await
    }

    pub async fn stop_script<B: Backend>(
        &mut self,
        backend: &B,
        id: &ScriptId,
    ) -> Result<(), CommandError> {
        self.run_command(backend, id, ScriptCommand::Stop).await
    }

    /// Stop the script if it is known to be running, start it otherwise.
    pub async fn toggle_script<B: Backend>(
        &mut self,
        backend: &B,
        id: &ScriptId,
    ) -> Result<ScriptCommand, CommandError> {
        let command = match self.states.status(id.as_str()) {
            RunStatus::Running => ScriptCommand::Stop,
            RunStatus::Stopped | RunStatus::Unknown => ScriptCommand::Start,
        };
        self.run_command(backend, id, command).await?;
        Ok(command)
    }

    /// Local state is left alone on success: the running flag only changes
    /// when the backend pushes the next status snapshot.
    async fn run_command<B: Backend>(
        &mut self,
        backend: &B,
        id: &ScriptId,
        command: ScriptCommand,
    ) -> Result<(), CommandError> {
        let Some(name) = self.catalog().display_name(id.as_str()).map(str::to_owned) else {
            return Err(self.unknown_script(id));
        };

        let result = match command {
            ScriptCommand::Start => backend.start_script(id).await,
            ScriptCommand::Stop => backend.stop_script(id).await,
        };

        match result {
            Ok(()) => {
                self.notify(Notice::success(format!("{name} {}", command.past_tense())));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    %e,
                    script = %id,
                    command = command.as_str(),
                    "Script command failed"
                );
                self.report_failure(&e);
                Err(e.into())
            }
        }
    }

    /// Clear a buffer.
    ///
    /// The system buffer mirrors persisted history, so it is cleared only
    /// once the backend acknowledges. Script buffers are cleared locally.
    pub async fn clear<B: Backend>(
        &mut self,
        backend: &B,
        id: &BufferId,
    ) -> Result<(), CommandError> {
        match id {
            BufferId::System => {
                if let Err(e) = backend.clear_history().await {
                    tracing::warn!(%e, "Clearing log history failed");
                    self.report_failure(&e);
                    return Err(e.into());
                }
            }
            BufferId::Script(script) => {
                if !self.buffers.contains(id) {
                    return Err(self.unknown_script(script));
                }
            }
        }

        self.buffers.clear(id);
        self.hooks.on_buffer_cleared(id);
        Ok(())
    }

    fn report_failure(&mut self, error: &ApiError) {
        let message = if error.is_rejection() {
            error.to_string()
        } else {
            REQUEST_FAILED.to_string()
        };
        self.notify(Notice::error(message));
    }

    fn unknown_script(&mut self, id: &ScriptId) -> CommandError {
        let error = CommandError::UnknownScript(id.clone());
        self.notify(Notice::error(error.to_string()));
        error
    }
}
