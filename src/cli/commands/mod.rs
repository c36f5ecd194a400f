//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Loads what it needs (project configuration, task registry)
//! 2. Calls the task layer to do the work
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Tasks are async because forges and transports perform network I/O.
//! `task run` builds a tokio runtime and blocks on the task.

mod completion;
mod task;

pub use completion::completion;

use crate::cli::args::{Command, TaskCommand};
use crate::cli::Context;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Task(TaskCommand::List) => task::list(ctx),
        Command::Task(TaskCommand::Info { key }) => task::info(ctx, &key),
        Command::Task(TaskCommand::Run { key, options }) => task::run(ctx, &key, options),
        Command::Completion { shell } => completion(shell),
    }
}
