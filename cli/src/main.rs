//! scriptdeck - terminal console for the script runner backend.
//!
//! # Architecture
//!
//! The binary wires [`scriptdeck_client`] (HTTP API and event stream) into
//! [`scriptdeck_core`] (routing, buffers, script state) and prints through a
//! [`presenter::TerminalPresenter`].
//!
//! ```text
//! main() -> Settings::resolve -> Bootstrapper::start -> watch loop
//!                                                        |
//!                       select! { stream event | stdin command | ctrl-c }
//! ```
//!
//! Logs go to `~/.scriptdeck/logs/scriptdeck.log`, never to stdout: stdout
//! carries the console itself.

mod action;
mod presenter;
mod watch;

use std::{
    fs::{self, OpenOptions},
    io,
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use scriptdeck_client::{ConsoleApi, HistoryQuery};
use scriptdeck_config::{DeckConfig, Overrides, Settings};
use scriptdeck_core::Console;
use scriptdeck_types::{BufferId, LogLevel, ScriptId};

use crate::action::Action;
use crate::presenter::{TerminalPresenter, format_record};

#[derive(Parser)]
#[command(name = "scriptdeck", version)]
#[command(about = "Follow script logs and control scripts on a scriptdeck backend")]
struct Cli {
    /// Backend base URL; overrides the config file and SCRIPTDECK_BASE_URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Replay recent history, then follow the live stream (default)
    Watch,
    /// Print persisted log history and exit
    History {
        #[arg(short = 'n', long, default_value_t = scriptdeck_core::DEFAULT_BACKLOG_LIMIT)]
        limit: usize,
        /// Only records from this source (display name or `system`)
        #[arg(long)]
        module: Option<String>,
        /// Only records at this level
        #[arg(long, value_enum)]
        level: Option<LevelArg>,
    },
    /// Start a script
    Start { script: String },
    /// Stop a script
    Stop { script: String },
    /// Clear the server-side log history
    Clear,
}

/// History filter level. Unlike wire payloads, typos are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LevelArg {
    Info,
    #[value(alias = "warning")]
    Warn,
    Error,
    Debug,
}

impl From<LevelArg> for LogLevel {
    fn from(level: LevelArg) -> Self {
        match level {
            LevelArg::Info => LogLevel::Info,
            LevelArg::Warn => LogLevel::Warn,
            LevelArg::Error => LogLevel::Error,
            LevelArg::Debug => LogLevel::Debug,
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave with console output.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => warnings.push(format!(
                "Failed to open log file {}: {e}",
                candidate.display()
            )),
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Some(config_path) = DeckConfig::path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("scriptdeck.log"));
    }

    candidates.push(PathBuf::from(".scriptdeck").join("logs").join("scriptdeck.log"));

    candidates
}

fn load_settings(base_url: Option<String>) -> Result<Settings> {
    let config = DeckConfig::load().context("failed to load configuration")?;
    let mut overrides = Overrides::from_env();
    if base_url.is_some() {
        overrides.base_url = base_url;
    }
    Settings::resolve(config.as_ref(), &overrides).context("invalid configuration")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();

    let settings = load_settings(cli.base_url)?;
    tracing::info!(base_url = %settings.base_url, "Starting scriptdeck");
    let api = ConsoleApi::new(settings.base_url.clone());

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch::run(&api, &settings).await,
        Command::History {
            limit,
            module,
            level,
        } => {
            let mut query = HistoryQuery::latest(limit);
            query.module = module;
            query.level = level.map(LogLevel::from);
            Ok(print_history(&api, &query).await)
        }
        Command::Start { script } => {
            let action = Action::Start(ScriptId::new(script));
            Ok(run_once(&api, &settings, action).await)
        }
        Command::Stop { script } => {
            let action = Action::Stop(ScriptId::new(script));
            Ok(run_once(&api, &settings, action).await)
        }
        Command::Clear => Ok(run_once(&api, &settings, Action::Clear(BufferId::System)).await),
    }
}

async fn print_history(api: &ConsoleApi, query: &HistoryQuery) -> ExitCode {
    match api.history(query).await {
        Ok(records) => {
            let mut presenter = TerminalPresenter::new(io::stdout());
            if records.is_empty() {
                presenter.line("(no logs)");
            }
            presenter.lines(records.iter().map(format_record));
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::warn!(%e, "Fetching history failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run a single write command. The outcome is printed as a notice.
async fn run_once(api: &ConsoleApi, settings: &Settings, action: Action) -> ExitCode {
    let mut console = Console::new(
        settings.catalog.clone(),
        settings.buffer_capacity,
        TerminalPresenter::new(io::stdout()),
    );
    let outcome = match &action {
        Action::Start(id) => console.start_script(api, id).await,
        Action::Stop(id) => console.stop_script(api, id).await,
        Action::Clear(buffer) => console.clear(api, buffer).await,
        other => {
            tracing::error!(?other, "Not a one-shot command");
            return ExitCode::FAILURE;
        }
    };
    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
