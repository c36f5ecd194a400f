//! cli::commands::task
//!
//! `metaship task list | info | run`.
//!
//! # Design
//!
//! `run` resolves the task and its options before building any
//! collaborator, so a typo in a task key or option fails without touching
//! git, the network or the org. Only the collaborator the task declares it
//! needs is built:
//!
//! - Forge: GitHub, targeted from `[repo]` or the git remote, token from
//!   `GITHUB_TOKEN`
//! - Transport: a [`LocalTransport`] rooted at `[org] path`
//!
//! # Example
//!
//! ```bash
//! metaship task list
//! metaship task info merge_branch
//! metaship task run merge_branch -o source_branch=main
//! ```

use std::collections::BTreeMap;

use anyhow::{bail, Context as _, Result};
use log::{debug, info, warn};

use crate::cli::Context;
use crate::core::config::Config;
use crate::forge::{create_forge, resolve_target, Forge, TOKEN_ENV};
use crate::git::Git;
use crate::tasks::{Task, TaskContext, TaskNeeds, TaskRegistry};
use crate::transport::LocalTransport;
use crate::ui::output;

/// Print every built-in task.
pub fn list(ctx: &Context) -> Result<()> {
    let registry = TaskRegistry::builtin();
    output::print(output::format_task_table(registry.iter()), ctx.verbosity);
    Ok(())
}

/// Print one task's description and options.
pub fn info(ctx: &Context, key: &str) -> Result<()> {
    let registry = TaskRegistry::builtin();
    let spec = registry.get(key)?;
    output::print(output::format_task_info(spec), ctx.verbosity);
    Ok(())
}

/// Run a task.
///
/// This is a synchronous wrapper that uses tokio to run the async implementation.
pub fn run(ctx: &Context, key: &str, options: Vec<(String, String)>) -> Result<()> {
    let loaded = Config::load(&ctx.cwd).context("Failed to load metaship.toml")?;
    for warning in &loaded.warnings {
        warn!("{} ({})", warning.message, warning.path.display());
    }
    let config = loaded.config;

    let registry = TaskRegistry::builtin();
    let needs = registry.get(key)?.needs;
    let cli_options: BTreeMap<String, String> = options.into_iter().collect();
    let task = registry.build(key, &config, &cli_options)?;

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(ctx, &config, task.as_ref(), needs))
}

/// Async implementation of run.
async fn run_async(
    ctx: &Context,
    config: &Config,
    task: &dyn Task,
    needs: TaskNeeds,
) -> Result<()> {
    let forge;
    let transport;
    let mut task_ctx = TaskContext::new(config);

    match needs {
        TaskNeeds::Forge => {
            forge = build_forge(config)?;
            task_ctx = task_ctx.with_forge(forge.as_ref());
        }
        TaskNeeds::Transport => {
            transport = LocalTransport::new(config.org_path());
            info!("Using org at {}", transport.root().display());
            task_ctx = task_ctx.with_transport(&transport);
        }
        TaskNeeds::Filesystem => {}
    }

    let result = task
        .run(&task_ctx)
        .await
        .with_context(|| format!("Task '{}' failed", task.key()))?;
    output::task_output(&result, ctx.verbosity);

    if result.has_failures() {
        bail!("Task '{}' completed with failures", task.key());
    }
    Ok(())
}

fn build_forge(config: &Config) -> Result<Box<dyn Forge>> {
    let remote_url = match Git::open(config.root()) {
        Ok(git) => git.remote_url(config.remote())?,
        Err(e) => {
            debug!("No git repository for remote discovery: {}", e);
            None
        }
    };
    let target = resolve_target(&config.project.repo, remote_url.as_deref())?;
    debug!(
        "Forge target {}/{} at {}",
        target.owner, target.repo, target.api_base
    );

    let token = std::env::var(TOKEN_ENV).ok();
    let forge = create_forge(&target, token.as_deref())
        .with_context(|| format!("Set {} to a token with repo access", TOKEN_ENV))?;
    Ok(forge)
}
