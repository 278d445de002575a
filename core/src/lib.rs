//! Client-side state of the scriptdeck console.
//!
//! Everything here runs on one task and needs no locks:
//!
//! - [`LogRouter`] decides which buffer a record belongs to
//! - [`BufferStore`] holds the bounded per-source buffers
//! - [`ScriptStateTable`] keeps the last pushed run state per script
//! - [`Console`] owns all of the above plus the presentation [`ConsoleHooks`]
//! - [`Bootstrapper`] runs config fetch, backlog replay and stream connect in order

mod backend;
mod bootstrap;
mod buffer;
mod console;
mod hooks;
mod router;
mod state_table;

#[cfg(test)]
mod testing;

pub use backend::Backend;
pub use bootstrap::{BootReport, Bootstrapper, DEFAULT_BACKLOG_LIMIT};
pub use buffer::{BufferStore, BufferView, DEFAULT_BUFFER_CAPACITY, LogBuffer};
pub use console::{CommandError, Console, ScriptCommand};
pub use hooks::{ConsoleHooks, Notice, NoticeKind};
pub use router::LogRouter;
pub use state_table::{RunStatus, ScriptStateTable};
