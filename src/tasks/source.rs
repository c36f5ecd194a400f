//! tasks::source
//!
//! Local rewrites of a metadata source tree. These tasks never talk to an
//! org or a forge.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::options::{OptionSpec, TaskOptions};
use super::{or_project, Task, TaskContext, TaskError, TaskOutput};
use crate::core::config::Config;
use crate::core::types::{DependencyVersion, VersionNumber};
use crate::metadata::metaxml::ApiVersionUpdater;
use crate::metadata::reconcile::DependencyVersionReconciler;
use crate::metadata::MetadataError;

pub(super) const UPDATE_DEPENDENCIES_OPTIONS: &[OptionSpec] = &[OptionSpec::with_default(
    "path",
    "src",
    "Metadata source directory, relative to the project root",
)];

pub(super) const UPDATE_API_VERSION_OPTIONS: &[OptionSpec] = &[
    OptionSpec::with_default(
        "path",
        "src",
        "Metadata source directory, relative to the project root",
    ),
    OptionSpec::optional(
        "version",
        "API version to set, e.g. 47.0. Defaults to package.api_version",
    ),
];

fn source_dir(path: &Path) -> Result<&Path, TaskError> {
    if !path.is_dir() {
        return Err(MetadataError::MissingMember(path.to_path_buf()).into());
    }
    Ok(path)
}

pub(super) fn build_update_dependencies(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    Ok(Box::new(UpdateDependencies {
        path: config.root().join(options.require("path")?),
        dependencies: config.dependencies()?,
    }))
}

struct UpdateDependencies {
    path: PathBuf,
    dependencies: Vec<DependencyVersion>,
}

#[async_trait]
impl Task for UpdateDependencies {
    fn key(&self) -> &'static str {
        "update_dependencies"
    }

    async fn run(&self, _: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let dir = source_dir(&self.path)?;
        let reconciler = DependencyVersionReconciler::new(self.dependencies.iter().cloned());
        Ok(TaskOutput::Files(reconciler.reconcile_dir(dir)?))
    }
}

pub(super) fn build_update_api_version(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let version = or_project(options, "version", config.api_version());
    let valid = version.contains('.') && version.parse::<VersionNumber>().is_ok();
    if !valid {
        return Err(options
            .invalid("version", &format!("'{}' is not an API version like 47.0", version))
            .into());
    }

    Ok(Box::new(UpdateApiVersion {
        path: config.root().join(options.require("path")?),
        version: version.to_string(),
    }))
}

struct UpdateApiVersion {
    path: PathBuf,
    version: String,
}

#[async_trait]
impl Task for UpdateApiVersion {
    fn key(&self) -> &'static str {
        "update_api_version"
    }

    async fn run(&self, _: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let dir = source_dir(&self.path)?;
        let updater = ApiVersionUpdater::new(self.version.as_str());
        Ok(TaskOutput::Files(updater.update_dir(dir)?))
    }
}
