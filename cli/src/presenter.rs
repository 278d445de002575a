//! Line-oriented terminal output for console events.

use std::io::Write;

use scriptdeck_core::{BufferView, Console, ConsoleHooks, Notice, NoticeKind, RunStatus};
use scriptdeck_types::{
    BufferId, ChannelState, LogLevel, LogRecord, ScriptId, ScriptState, sanitize_log_line,
};
use serde_json::Value;

/// Writes every console callback as one line.
///
/// Write errors are ignored: a closed stdout must not take the stream down.
pub struct TerminalPresenter<W> {
    out: W,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub(crate) fn into_inner(self) -> W {
        self.out
    }

    pub fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }

    pub fn lines<I>(&mut self, lines: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        for line in lines {
            let _ = writeln!(self.out, "{}", line.as_ref());
        }
        let _ = self.out.flush();
    }
}

fn level_tag(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "INFO ",
        LogLevel::Warn => "WARN ",
        LogLevel::Error => "ERROR",
        LogLevel::Debug => "DEBUG",
    }
}

#[must_use]
pub fn format_record(record: &LogRecord) -> String {
    format!(
        "{} {} [{}] {}",
        record.timestamp(),
        level_tag(record.level()),
        sanitize_log_line(record.source()),
        sanitize_log_line(record.message())
    )
}

/// Lines for `show`: the buffer contents or an empty-state marker.
pub fn render_buffer<H: ConsoleHooks>(console: &Console<H>, id: &BufferId) -> Vec<String> {
    let title = match id {
        BufferId::System => "system".to_string(),
        BufferId::Script(script) => match console.catalog().display_name(script.as_str()) {
            Some(name) => format!("{script} ({name})"),
            None => return vec![format!("error: unknown script `{script}`")],
        },
    };

    let mut lines = vec![format!("== {title} ==")];
    match console.view(id) {
        BufferView::Empty => lines.push("(no logs)".to_string()),
        BufferView::Lines(records) => lines.extend(records.map(format_record)),
    }
    lines
}

/// Lines for `status`: one per catalog script plus the stream state.
pub fn render_status<H: ConsoleHooks>(console: &Console<H>) -> Vec<String> {
    let stream = console
        .channel_state()
        .map_or("not connected", ChannelState::as_str);
    let mut lines = vec![format!("stream: {stream}")];
    for entry in console.catalog().iter() {
        let status = console.status(entry.id.as_str());
        let badge = match status {
            RunStatus::Running => "[running]",
            RunStatus::Stopped => "[stopped]",
            RunStatus::Unknown => "",
        };
        let buffered = console
            .buffers()
            .get(&BufferId::Script(entry.id.clone()))
            .map_or(0, scriptdeck_core::LogBuffer::len);
        let line = format!(
            "  {:<12} {:<10} {badge:<9} {buffered} lines",
            entry.id.as_str(),
            entry.display_name
        );
        lines.push(line.trim_end().to_string());
    }
    lines
}

impl<W: Write> ConsoleHooks for TerminalPresenter<W> {
    fn on_log_appended(&mut self, _buffer: &BufferId, record: &LogRecord) {
        self.line(&format_record(record));
    }

    fn on_state_changed(&mut self, id: &ScriptId, state: &ScriptState) {
        let status = if state.running { "running" } else { "stopped" };
        self.line(&format!("* {id} is {status}"));
    }

    fn on_channel_status_changed(&mut self, state: ChannelState) {
        self.line(&format!("-- stream {state}"));
    }

    fn on_buffer_cleared(&mut self, buffer: &BufferId) {
        self.line(&format!("-- cleared {buffer}"));
    }

    fn on_notice(&mut self, notice: &Notice) {
        let prefix = match notice.kind {
            NoticeKind::Success => "ok",
            NoticeKind::Error => "error",
        };
        self.line(&format!("{prefix}: {}", sanitize_log_line(&notice.message)));
    }

    fn on_config_loaded(&mut self, config: &Value) {
        let keys = config.as_object().map_or(0, serde_json::Map::len);
        self.line(&format!("-- configuration loaded ({keys} keys)"));
    }
}
