//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Results go to stdout and respect the quiet flag. Diagnostics go through
//! the `log` facade; [`Verbosity`] decides the logger's level so `--quiet`
//! silences both.

use std::fmt::Display;

use log::LevelFilter;

use crate::engine::{BranchOutcome, CascadeReport};
use crate::tasks::{OptionSpec, TaskOutput, TaskSpec};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - errors only
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Logger level for this verbosity. `RUST_LOG` may still override it.
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Error,
            Verbosity::Normal => LevelFilter::Info,
            Verbosity::Debug => LevelFilter::Debug,
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One line per registered task: key and description.
pub fn format_task_table<'a>(specs: impl IntoIterator<Item = &'a TaskSpec>) -> String {
    let specs: Vec<&TaskSpec> = specs.into_iter().collect();
    let width = specs.iter().map(|s| s.key.len()).max().unwrap_or(0);
    specs
        .iter()
        .map(|s| format!("{:width$}  {}", s.key, s.description, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_option(option: &OptionSpec) -> String {
    let mut line = format!("  {}", option.name);
    if option.required {
        line.push_str(" (required)");
    }
    if let Some(default) = option.default {
        line.push_str(&format!(" [default: {}]", default));
    }
    format!("{}\n      {}", line, option.description)
}

/// Description of one task and its option schema.
pub fn format_task_info(spec: &TaskSpec) -> String {
    let mut out = format!("{}\n\n{}\n", spec.key, spec.description);
    if spec.options.is_empty() {
        out.push_str("\nNo options.");
    } else {
        out.push_str("\nOptions:\n");
        let options: Vec<String> = spec.options.iter().map(format_option).collect();
        out.push_str(&options.join("\n"));
    }
    out
}

fn format_outcome(outcome: &BranchOutcome) -> String {
    match outcome {
        BranchOutcome::NoDiff => "no diff".to_string(),
        BranchOutcome::Merged { commits, .. } => format!("merged {} commit(s)", commits),
        BranchOutcome::UpToDate => "up to date".to_string(),
        BranchOutcome::ConflictPrExists => "conflict, pull request already open".to_string(),
        BranchOutcome::ConflictPrCreated { number } => {
            format!("conflict, opened pull request #{}", number)
        }
        BranchOutcome::Failed { error } => format!("failed: {}", error),
    }
}

/// Per-branch results, indented by depth.
pub fn format_cascade(report: &CascadeReport) -> String {
    report
        .branches
        .iter()
        .map(|result| {
            format!(
                "{}{}: {}",
                "  ".repeat(result.depth + 1),
                result.branch,
                format_outcome(&result.outcome)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print what a task produced.
pub fn task_output(output: &TaskOutput, verbosity: Verbosity) {
    print(output, verbosity);
    let detail = match output {
        TaskOutput::Cascade(report) => format_cascade(report),
        TaskOutput::Files(updates) => {
            let paths: Vec<String> = updates.iter().map(|u| u.path.display().to_string()).collect();
            format_list(&paths, "  ")
        }
        TaskOutput::Bundles(bundles) => {
            let lines: Vec<String> = bundles
                .iter()
                .map(|b| {
                    let components = b.report.deploy.as_ref().map_or(0, |d| d.components);
                    format!("{}: {} component(s)", b.name, components)
                })
                .collect();
            format_list(&lines, "  ")
        }
        TaskOutput::Etl(_) => String::new(),
    };
    if !detail.is_empty() {
        print(detail, verbosity);
    }
}
