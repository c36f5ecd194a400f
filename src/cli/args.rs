//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Errors only

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::tasks::options::parse_option_pair;

/// metaship - Release automation for metadata-driven platforms
#[derive(Parser, Debug)]
#[command(name = "metaship")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if metaship was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Errors only
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List, describe and run tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Generate shell completion scripts
    #[command(after_help = "\
EXAMPLES:
    # Bash (add to ~/.bashrc)
    eval \"$(metaship completion bash)\"

    # Zsh (add to ~/.zshrc)
    eval \"$(metaship completion zsh)\"

    # Fish
    metaship completion fish | source

    # PowerShell
    metaship completion powershell | Out-String | Invoke-Expression")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// `metaship task ...`
#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// List the built-in tasks
    List,

    /// Show a task's description and options
    Info {
        /// Task key, e.g. merge_branch
        key: String,
    },

    /// Run a task
    #[command(after_help = "\
EXAMPLES:
    # Cascade main into every feature/ branch
    metaship task run merge_branch

    # Add a related list to two layouts
    metaship task run add_related_lists \\
        -o related_list=RelatedContactList \\
        -o 'api_names=Account-Account Layout,Contact-Contact Layout'

Options given with -o override [tasks.<key>.options] in metaship.toml.")]
    Run {
        /// Task key, e.g. merge_branch
        key: String,

        /// Task option as name=value (repeatable)
        #[arg(short = 'o', long = "option", value_name = "NAME=VALUE", value_parser = parse_option_pair)]
        options: Vec<(String, String)>,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
