//! cli
//!
//! Command-line interface layer for metaship.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Load the project configuration
//! - Build collaborators (forge, transport) for the task being run
//! - Delegate to the task layer and print results
//!
//! # Architecture
//!
//! The CLI layer is thin. It resolves a task through the
//! [`crate::tasks::TaskRegistry`], wires a [`crate::tasks::TaskContext`] and
//! drives the async task on a tokio runtime. Errors are reported through
//! `anyhow` with context.

pub mod args;
pub mod commands;

pub use args::{Cli, Shell};

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::ui::output::Verbosity;

/// Settings shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    /// Directory the project is searched from
    pub cwd: PathBuf,
    pub verbosity: Verbosity,
}

impl Context {
    /// Build from parsed global flags.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let cwd = match &cli.cwd {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("Failed to read the current directory")?,
        };
        Ok(Self {
            cwd,
            verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
        })
    }
}

/// Run the CLI application.
///
/// `main.rs` parses arguments and sets up logging before calling this.
pub fn run(cli: Cli) -> Result<()> {
    let ctx = Context::from_cli(&cli)?;
    commands::dispatch(cli.command, &ctx)
}
