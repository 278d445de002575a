//! Interactive commands typed while watching.

use scriptdeck_types::{BufferId, ScriptId};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  start <script>          start a script
  stop <script>           stop a script
  toggle <script>         stop if running, start otherwise
  clear [system|<script>] clear a log buffer (system clears server history)
  show [system|<script>]  print a log buffer
  status                  script states and stream status
  help                    this text
  quit                    exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start(ScriptId),
    Stop(ScriptId),
    Toggle(ScriptId),
    Clear(BufferId),
    Show(BufferId),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActionError {
    #[error("unknown command `{0}` (try `help`)")]
    Unknown(String),
    #[error("`{0}` needs a script id")]
    MissingScript(&'static str),
    #[error("`{command}` takes at most one argument")]
    TooManyArguments { command: &'static str },
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_action(line: &str) -> Result<Option<Action>, ActionError> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let argument = words.next();
    let extra = words.next();

    let action = match command.to_ascii_lowercase().as_str() {
        "start" => Action::Start(script_arg("start", argument, extra)?),
        "stop" => Action::Stop(script_arg("stop", argument, extra)?),
        "toggle" => Action::Toggle(script_arg("toggle", argument, extra)?),
        "clear" => Action::Clear(buffer_arg("clear", argument, extra)?),
        "show" => Action::Show(buffer_arg("show", argument, extra)?),
        "status" => Action::Status,
        "help" | "?" => Action::Help,
        "quit" | "exit" | "q" => Action::Quit,
        _ => return Err(ActionError::Unknown(command.to_string())),
    };
    Ok(Some(action))
}

fn script_arg(
    command: &'static str,
    argument: Option<&str>,
    extra: Option<&str>,
) -> Result<ScriptId, ActionError> {
    if extra.is_some() {
        return Err(ActionError::TooManyArguments { command });
    }
    argument
        .map(ScriptId::from)
        .ok_or(ActionError::MissingScript(command))
}

fn buffer_arg(
    command: &'static str,
    argument: Option<&str>,
    extra: Option<&str>,
) -> Result<BufferId, ActionError> {
    if extra.is_some() {
        return Err(ActionError::TooManyArguments { command });
    }
    Ok(argument.map_or(BufferId::System, BufferId::parse))
}
