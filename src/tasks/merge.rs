//! tasks::merge
//!
//! `merge_branch`: cascade the source branch down the feature branches.

use async_trait::async_trait;

use super::options::{OptionSpec, TaskOptions};
use super::{or_project, Task, TaskContext, TaskError, TaskOutput};
use crate::core::config::Config;
use crate::core::types::BranchName;
use crate::engine::{BranchCascadeMerger, CascadeOptions};

pub(super) const MERGE_BRANCH_OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional(
        "source_branch",
        "The branch to merge from. Defaults to git.default_branch",
    ),
    OptionSpec::optional(
        "branch_prefix",
        "Prefix of branches to merge into. Defaults to git.prefix_feature",
    ),
    OptionSpec::with_default(
        "children_only",
        "false",
        "Only merge into <source_branch>__* child branches",
    ),
];

pub(super) fn build_merge_branch(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let source = or_project(options, "source_branch", config.default_branch());
    BranchName::new(source).map_err(|e| options.invalid("source_branch", &e.to_string()))?;
    let prefix = or_project(options, "branch_prefix", config.prefix_feature());

    Ok(Box::new(MergeBranch {
        options: CascadeOptions::new(source, prefix).children_only(options.flag("children_only")?),
    }))
}

#[derive(Debug)]
struct MergeBranch {
    options: CascadeOptions,
}

#[async_trait]
impl Task for MergeBranch {
    fn key(&self) -> &'static str {
        "merge_branch"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let forge = ctx.forge(self.key())?;
        let report = BranchCascadeMerger::new(forge, self.options.clone())
            .run()
            .await?;
        Ok(TaskOutput::Cascade(report))
    }
}
