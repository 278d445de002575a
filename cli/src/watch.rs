//! The interactive follow loop.

use std::io::{self, Write};
use std::process::ExitCode;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use scriptdeck_client::{ChannelConfig, ConsoleApi, EventChannel};
use scriptdeck_config::Settings;
use scriptdeck_core::{Backend, Bootstrapper, Console};

use crate::action::{Action, HELP, parse_action};
use crate::presenter::{TerminalPresenter, render_buffer, render_status};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) async fn run(api: &ConsoleApi, settings: &Settings) -> Result<ExitCode> {
    let connector = api.stream_connector()?;
    let channel_config = ChannelConfig {
        retry_delay: settings.retry_delay,
        idle_timeout: settings.idle_timeout,
        ..ChannelConfig::default()
    };
    let (mut channel, mut events) = EventChannel::new(connector, channel_config);
    let mut console = Console::new(
        settings.catalog.clone(),
        settings.buffer_capacity,
        TerminalPresenter::new(io::stdout()),
    );

    let report = Bootstrapper::new(settings.backlog_limit)
        .start(api, &mut console, &mut channel)
        .await;
    tracing::info!(?report, "Bootstrap finished");
    console.hooks_mut().line("type `help` for commands");

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => console.apply(event),
                None => break,
            },
            line = input.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if handle_line(api, &mut console, &line).await == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {
                    tracing::debug!("stdin closed; following stream only");
                    input_open = false;
                }
                Err(e) => {
                    tracing::warn!(%e, "Reading stdin failed; following stream only");
                    input_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    channel.disconnect().await;
    tracing::info!("Shutting down");
    Ok(ExitCode::SUCCESS)
}

/// Execute one typed command against the console.
///
/// Command failures have already been reported through notices.
pub(crate) async fn handle_line<B, W>(
    backend: &B,
    console: &mut Console<TerminalPresenter<W>>,
    line: &str,
) -> Flow
where
    B: Backend,
    W: Write,
{
    let action = match parse_action(line) {
        Ok(Some(action)) => action,
        Ok(None) => return Flow::Continue,
        Err(e) => {
            console.hooks_mut().line(&format!("error: {e}"));
            return Flow::Continue;
        }
    };

    let outcome = match action {
        Action::Start(id) => console.start_script(backend, &id).await,
        Action::Stop(id) => console.stop_script(backend, &id).await,
        Action::Toggle(id) => console.toggle_script(backend, &id).await.map(drop),
        Action::Clear(buffer) => console.clear(backend, &buffer).await,
        Action::Show(buffer) => {
            let lines = render_buffer(console, &buffer);
            console.hooks_mut().lines(lines);
            Ok(())
        }
        Action::Status => {
            let lines = render_status(console);
            console.hooks_mut().lines(lines);
            Ok(())
        }
        Action::Help => {
            console.hooks_mut().line(HELP);
            Ok(())
        }
        Action::Quit => return Flow::Quit,
    };

    if let Err(e) = outcome {
        tracing::debug!(%e, line, "Command failed");
    }
    Flow::Continue
}
