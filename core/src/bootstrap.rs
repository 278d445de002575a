//! Startup sequence: configuration, backlog replay, then the live stream.
//!
//! The stream is connected only after the backlog has been replayed, so every
//! buffer holds history first and live lines after it. A failed fetch costs
//! a notice, never the rest of the sequence.

use scriptdeck_client::{Connector, EventChannel};

use crate::backend::Backend;
use crate::console::Console;
use crate::hooks::{ConsoleHooks, Notice};

pub const DEFAULT_BACKLOG_LIMIT: usize = 100;

/// What happened during [`Bootstrapper::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BootReport {
    pub config_loaded: bool,
    /// Backlog records routed into buffers.
    pub replayed: usize,
    pub backlog_failed: bool,
}

#[derive(Debug, Clone)]
pub struct Bootstrapper {
    backlog_limit: usize,
}

impl Default for Bootstrapper {
    fn default() -> Self {
        Self::new(DEFAULT_BACKLOG_LIMIT)
    }
}

impl Bootstrapper {
    #[must_use]
    pub fn new(backlog_limit: usize) -> Self {
        Self { backlog_limit }
    }

    #[must_use]
    pub fn backlog_limit(&self) -> usize {
        self.backlog_limit
    }

    pub async fn start<B, H, C>(
        &self,
        backend: &B,
        console: &mut Console<H>,
        channel: &mut EventChannel<C>,
    ) -> BootReport
    where
        B: Backend,
        H: ConsoleHooks,
        C: Connector,
    {
        let mut report = BootReport::default();

        match backend.fetch_config().await {
            Ok(config) => {
                console.config_loaded(&config);
                report.config_loaded = true;
            }
            Err(e) => {
                tracing::warn!(%e, "Loading configuration failed");
                console.notify(Notice::error(format!(
                    "failed to load configuration: {}",
                    e.summary()
                )));
            }
        }

        match backend.fetch_history(self.backlog_limit).await {
            Ok(records) => {
                report.replayed = console.replay(records);
                tracing::info!(replayed = report.replayed, "Replayed log backlog");
            }
            Err(e) => {
                tracing::warn!(%e, "Loading log history failed");
                report.backlog_failed = true;
                console.notify(Notice::error(format!(
                    "failed to load log history: {}",
                    e.summary()
                )));
            }
        }

        channel.connect().await;
        report
    }
}
