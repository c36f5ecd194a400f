//! tasks
//!
//! Named, configurable units of work built on the engines.
//!
//! # Architecture
//!
//! Every task is registered under a stable key with an option schema. The
//! lifecycle of one invocation is:
//!
//! ```text
//! key -> registry lookup -> option resolution -> build -> run(context)
//! ```
//!
//! Lookup and option resolution happen before any collaborator is created,
//! so an unknown key or option fails without touching the network or the
//! filesystem. Tasks receive their collaborators through [`TaskContext`]
//! rather than constructing them.
//!
//! # Modules
//!
//! - [`options`]: Option schemas and resolved values
//! - [`registry`]: The built-in task table
//! - `merge`: `merge_branch`
//! - `metadata`: ETL tasks (transforms, packages, deploy, retrieve)
//! - `source`: Source-tree rewrites (dependencies, API version)

mod merge;
mod metadata;
pub mod options;
pub mod registry;
mod source;

pub use options::{OptionSpec, TaskOptions};
pub use registry::{TaskNeeds, TaskRegistry, TaskSpec};

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::config::{Config, ConfigError};
use crate::engine::{CascadeError, CascadeReport, EtlError, EtlReport};
use crate::forge::{Forge, ForgeError};
use crate::metadata::metaxml::FileUpdate;
use crate::metadata::MetadataError;
use crate::transport::{MetadataTransport, TransportError};

/// Errors from building or running a task.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Etl(#[from] EtlError),

    #[error(transparent)]
    Cascade(#[from] CascadeError),

    #[error(transparent)]
    Forge(#[from] ForgeError),

    #[error("task '{task}' needs a {what}, but none was provided")]
    MissingCollaborator { task: String, what: &'static str },
}

impl TaskError {
    /// Whether the error was raised before any mutation because of bad
    /// configuration.
    pub fn is_configuration(&self) -> bool {
        match self {
            TaskError::Config(_) | TaskError::MissingCollaborator { .. } => true,
            TaskError::Metadata(e) => e.is_configuration(),
            TaskError::Etl(e) => e.is_configuration(),
            _ => false,
        }
    }
}

/// Collaborators a task runs against.
pub struct TaskContext<'a> {
    pub config: &'a Config,
    forge: Option<&'a dyn Forge>,
    transport: Option<&'a dyn MetadataTransport>,
    working_dir: Option<&'a Path>,
}

impl<'a> TaskContext<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            forge: None,
            transport: None,
            working_dir: None,
        }
    }

    pub fn with_forge(mut self, forge: &'a dyn Forge) -> Self {
        self.forge = Some(forge);
        self
    }

    pub fn with_transport(mut self, transport: &'a dyn MetadataTransport) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use a fixed working directory instead of a fresh temporary one.
    pub fn with_working_dir(mut self, dir: &'a Path) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn forge(&self, task: &str) -> Result<&'a dyn Forge, TaskError> {
        self.forge.ok_or_else(|| TaskError::MissingCollaborator {
            task: task.to_string(),
            what: "forge",
        })
    }

    pub fn transport(&self, task: &str) -> Result<&'a dyn MetadataTransport, TaskError> {
        self.transport.ok_or_else(|| TaskError::MissingCollaborator {
            task: task.to_string(),
            what: "metadata transport",
        })
    }

    pub fn working_dir(&self) -> Option<&'a Path> {
        self.working_dir
    }
}

/// Deploy result for one bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub name: String,
    pub report: EtlReport,
}

/// What a task produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutput {
    Cascade(CascadeReport),
    Etl(EtlReport),
    Bundles(Vec<BundleReport>),
    Files(Vec<FileUpdate>),
}

impl TaskOutput {
    /// Whether the task completed but some of its work failed.
    pub fn has_failures(&self) -> bool {
        matches!(self, TaskOutput::Cascade(report) if report.has_failures())
    }
}

impl fmt::Display for TaskOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutput::Cascade(report) => {
                let merged = report
                    .branches
                    .iter()
                    .filter(|r| matches!(r.outcome, crate::engine::BranchOutcome::Merged { .. }))
                    .count();
                let failed = report.failures().count();
                write!(
                    f,
                    "Cascaded {} into {} branch(es): {} merged, {} failed",
                    report.source,
                    report.branches.len(),
                    merged,
                    failed
                )
            }
            TaskOutput::Etl(report) => match (&report.manifest, &report.deploy) {
                (_, Some(deploy)) => write!(f, "Deployed {} component(s)", deploy.components),
                (Some(manifest), None) => {
                    let members: usize = manifest.types().iter().map(|t| t.members.len()).sum();
                    write!(f, "Transformed {} member(s)", members)
                }
                (None, None) => write!(f, "Retrieved {} file(s)", report.retrieved),
            },
            TaskOutput::Bundles(bundles) => {
                let components: usize = bundles
                    .iter()
                    .filter_map(|b| b.report.deploy.as_ref())
                    .map(|d| d.components)
                    .sum();
                write!(
                    f,
                    "Deployed {} bundle(s) ({} component(s))",
                    bundles.len(),
                    components
                )
            }
            TaskOutput::Files(updates) => {
                let changes: usize = updates.iter().map(|u| u.changes).sum();
                write!(f, "Updated {} file(s) ({} change(s))", updates.len(), changes)
            }
        }
    }
}

/// A built, ready-to-run task.
#[async_trait]
pub trait Task: Send + Sync {
    /// Registry key this task was built from.
    fn key(&self) -> &'static str;

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError>;
}

/// Fallback for options whose default comes from the project file.
pub(crate) fn or_project<'a>(options: &'a TaskOptions, name: &str, project: &'a str) -> &'a str {
    options.get(name).unwrap_or(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::manifest::PackagingManifest;
    use crate::transport::DeployResult;

    #[test]
    fn missing_collaborators_are_configuration_errors() {
        let config = Config::default();
        let ctx = TaskContext::new(&config);
        let err = match ctx.forge("merge_branch") {
            Err(e) => e,
            Ok(_) => panic!("expected missing forge"),
        };
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "task 'merge_branch' needs a forge, but none was provided"
        );
    }

    #[test]
    fn output_summaries() {
        let files = TaskOutput::Files(vec![
            FileUpdate {
                path: "a-meta.xml".into(),
                changes: 2,
            },
            FileUpdate {
                path: "b-meta.xml".into(),
                changes: 1,
            },
        ]);
        assert_eq!(files.to_string(), "Updated 2 file(s) (3 change(s))");

        let etl = TaskOutput::Etl(EtlReport {
            manifest: Some(PackagingManifest::single("Layout", ["A", "B"])),
            ..Default::default()
        });
        assert_eq!(etl.to_string(), "Transformed 2 member(s)");

        let bundles = TaskOutput::Bundles(vec![
            BundleReport {
                name: "core".to_string(),
                report: EtlReport {
                    deploy: Some(DeployResult::succeeded(3)),
                    ..Default::default()
                },
            },
            BundleReport {
                name: "extras".to_string(),
                report: EtlReport {
                    deploy: Some(DeployResult::succeeded(1)),
                    ..Default::default()
                },
            },
        ]);
        assert_eq!(bundles.to_string(), "Deployed 2 bundle(s) (4 component(s))");
    }
}
