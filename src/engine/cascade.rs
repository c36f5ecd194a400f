//! engine::cascade
//!
//! Branch cascade merger.
//!
//! Merges a source branch into every feature branch on the forge, and from
//! each merged parent into its `parent__child` branches.
//!
//! # Lifecycle
//!
//! ```text
//! repo -> source branch -> open pulls -> branch listing -> forest -> cascade
//! ```
//!
//! The first four calls happen exactly once per run. A missing source branch
//! aborts the run before anything else is fetched.
//!
//! # Per-branch decisions
//!
//! For every node, in listing order, depth first:
//!
//! - no file diffs against the commit being cascaded: skip the node and its
//!   subtree
//! - clean merge: continue into children with the new merge commit
//! - nothing to merge: continue into children with the same commit
//! - conflict: reuse or open a `Merge <source> into <branch>` pull request,
//!   then continue into children with the same commit
//! - forge error: log and record it, skip the subtree, keep going with the
//!   remaining branches
//!
//! Every decision is logged through `log` and mirrored in the
//! [`CascadeReport`] trace.

use log::{error, Level};
use thiserror::Error;

use crate::core::graph::{BranchForest, BranchHead};
use crate::core::types::BranchName;
use crate::forge::{CreatePrRequest, Forge, ForgeError, MergeOutcome, MergeRequest, PullRequest};

/// Indentation added per level of nesting in trace lines.
const INDENT: &str = "    ";

/// Fatal cascade errors. Per-branch failures are recorded in the report.
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("source branch '{branch}' not found: {source}")]
    SourceNotFound { branch: String, source: ForgeError },

    #[error(transparent)]
    Forge(#[from] ForgeError),
}

/// What to cascade and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeOptions {
    /// Branch whose head is merged downstream
    pub source_branch: String,
    /// Feature branch prefix candidates must start with
    pub branch_prefix: String,
    /// Only merge into `<source>__*` branches
    pub children_only: bool,
}

impl CascadeOptions {
    pub fn new(source_branch: impl Into<String>, branch_prefix: impl Into<String>) -> Self {
        Self {
            source_branch: source_branch.into(),
            branch_prefix: branch_prefix.into(),
            children_only: false,
        }
    }

    pub fn children_only(mut self, children_only: bool) -> Self {
        self.children_only = children_only;
        self
    }

    /// The prefix a branch must carry to be merged into.
    pub fn effective_prefix(&self) -> String {
        if self.children_only {
            format!("{}{}", self.source_branch, crate::core::types::CHILD_SEPARATOR)
        } else {
            self.branch_prefix.clone()
        }
    }
}

/// How one branch was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchOutcome {
    /// No file diffs; the subtree was skipped
    NoDiff,
    /// Merged cleanly into a new head
    Merged { commits: u64, sha: String },
    /// The forge reported nothing to merge
    UpToDate,
    /// Conflict; an open merge PR already existed
    ConflictPrExists,
    /// Conflict; a merge PR was opened
    ConflictPrCreated { number: u64 },
    /// A forge call failed; the subtree was skipped
    Failed { error: String },
}

/// A branch with its outcome and depth in the forest (0 = top level).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchResult {
    pub branch: String,
    pub depth: usize,
    pub outcome: BranchOutcome,
}

/// One logged decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub level: Level,
    pub message: String,
}

/// Result of a cascade run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub source: String,
    /// Decisions in the order they were logged
    pub trace: Vec<TraceLine>,
    /// Visited branches in visit order
    pub branches: Vec<BranchResult>,
}

impl CascadeReport {
    fn new(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }

    fn note(&mut self, level: Level, message: String) {
        log::log!(level, "{}", message);
        self.trace.push(TraceLine { level, message });
    }

    /// Trace messages at `level` or more severe.
    pub fn messages(&self, level: Level) -> Vec<&str> {
        self.trace
            .iter()
            .filter(|line| line.level <= level)
            .map(|line| line.message.as_str())
            .collect()
    }

    pub fn outcome(&self, branch: &str) -> Option<&BranchOutcome> {
        self.branches
            .iter()
            .find(|r| r.branch == branch)
            .map(|r| &r.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &BranchResult> {
        self.branches
            .iter()
            .filter(|r| matches!(r.outcome, BranchOutcome::Failed { .. }))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// A node waiting to be merged into.
struct Pending {
    branch: BranchName,
    commit: String,
    depth: usize,
}

/// Merges a source branch down the feature branch forest.
pub struct BranchCascadeMerger<'a> {
    forge: &'a dyn Forge,
    options: CascadeOptions,
}

impl<'a> BranchCascadeMerger<'a> {
    pub fn new(forge: &'a dyn Forge, options: CascadeOptions) -> Self {
        Self { forge, options }
    }

    pub fn options(&self) -> &CascadeOptions {
        &self.options
    }

    /// Run the cascade.
    ///
    /// # Errors
    ///
    /// Fails only when the repository, source branch, pull or branch listing
    /// cannot be fetched. Merge and pull request failures are recorded in
    /// the returned report.
    pub async fn run(&self) -> Result<CascadeReport, CascadeError> {
        let source = self.options.source_branch.as_str();
        let mut report = CascadeReport::new(source);

        self.forge.get_repo().await?;

        let source_head = match self.forge.get_branch(source).await {
            Ok(branch) => branch,
            Err(e @ ForgeError::NotFound(_)) => {
                error!("Source branch {} does not exist", source);
                return Err(CascadeError::SourceNotFound {
                    branch: source.to_string(),
                    source: e,
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut pulls = self.forge.list_open_pulls().await?;
        let branches = self.forge.list_branches().await?;

        let prefix = self.options.effective_prefix();
        let mut candidates = Vec::new();
        for branch in branches {
            if branch.name == source {
                report.note(
                    Level::Debug,
                    format!("Skipping branch {}: is source branch", branch.name),
                );
                continue;
            }
            if !branch.name.starts_with(&prefix) {
                report.note(
                    Level::Debug,
                    format!(
                        "Skipping branch {}: does not match prefix {}",
                        branch.name, prefix
                    ),
                );
                continue;
            }
            match BranchName::new(branch.name.as_str()) {
                Ok(name) => candidates.push(BranchHead::new(name, branch.sha)),
                Err(e) => report.note(
                    Level::Debug,
                    format!("Skipping branch {}: {}", branch.name, e),
                ),
            }
        }

        let forest = if self.options.children_only {
            BranchForest::flat(candidates)
        } else {
            BranchForest::build(candidates)
        };

        let mut stack: Vec<Pending> = forest
            .roots()
            .iter()
            .rev()
            .map(|branch| Pending {
                branch: branch.clone(),
                commit: source_head.sha.clone(),
                depth: 0,
            })
            .collect();

        while let Some(pending) = stack.pop() {
            let next_commit = self.merge_node(&forest, &pending, &mut pulls, &mut report).await;
            let Some(next_commit) = next_commit else {
                continue;
            };
            let children = forest.children(&pending.branch);
            if children.is_empty() {
                continue;
            }
            report.note(
                Level::Info,
                format!(
                    "{}  Merging into child branches:",
                    INDENT.repeat(pending.depth)
                ),
            );
            stack.extend(children.iter().rev().map(|child| Pending {
                branch: child.clone(),
                commit: next_commit.clone(),
                depth: pending.depth + 1,
            }));
        }

        Ok(report)
    }

    fn kind(&self, forest: &BranchForest, branch: &BranchName) -> &'static str {
        if forest.has_children(branch) {
            "parent branch"
        } else if self.options.children_only {
            "child branch"
        } else {
            "branch"
        }
    }

    /// Handle one node. Returns the commit to cascade into its children, or
    /// `None` when the subtree is skipped.
    async fn merge_node(
        &self,
        forest: &BranchForest,
        pending: &Pending,
        pulls: &mut Vec<PullRequest>,
        report: &mut CascadeReport,
    ) -> Option<String> {
        let name = pending.branch.as_str();
        let indent = INDENT.repeat(pending.depth);
        let kind = self.kind(forest, &pending.branch);

        let (outcome, next_commit) =
            match self.try_merge(name, &pending.commit, pulls).await {
                Ok(result) => result,
                Err(e) => {
                    report.note(
                        Level::Error,
                        format!("{}Failed to merge into {} {}: {}", indent, kind, name, e),
                    );
                    (BranchOutcome::Failed { error: e.to_string() }, None)
                }
            };

        let message = match &outcome {
            BranchOutcome::NoDiff => Some(format!("Skipping {} {}: no file diffs found", kind, name)),
            BranchOutcome::Merged { commits, .. } => {
                Some(format!("Merged {} commits into {} {}", commits, kind, name))
            }
            BranchOutcome::UpToDate => Some(format!("Nothing to merge into {} {}", kind, name)),
            BranchOutcome::ConflictPrExists => Some(format!(
                "Merge conflict on {} {}: merge PR already exists",
                kind, name
            )),
            BranchOutcome::ConflictPrCreated { number } => Some(format!(
                "Merge conflict on {} {}: created pull request #{}",
                kind, name, number
            )),
            BranchOutcome::Failed { .. } => None,
        };
        if let Some(message) = message {
            report.note(Level::Info, format!("{}{}", indent, message));
        }

        report.branches.push(BranchResult {
            branch: name.to_string(),
            depth: pending.depth,
            outcome,
        });
        next_commit
    }

    async fn try_merge(
        &self,
        branch: &str,
        commit: &str,
        pulls: &mut Vec<PullRequest>,
    ) -> Result<(BranchOutcome, Option<String>), ForgeError> {
        let comparison = self.forge.compare(branch, commit).await?;
        if comparison.files.is_empty() {
            return Ok((BranchOutcome::NoDiff, None));
        }

        let outcome = self.forge.merge(MergeRequest::new(branch, commit)).await?;
        match outcome {
            MergeOutcome::Merged { sha } => Ok((
                BranchOutcome::Merged {
                    commits: comparison.ahead_by,
                    sha: sha.clone(),
                },
                Some(sha),
            )),
            MergeOutcome::NothingToMerge => Ok((BranchOutcome::UpToDate, Some(commit.to_string()))),
            MergeOutcome::Conflict => {
                let source = self.options.source_branch.as_str();
                let existing = pulls
                    .iter()
                    .any(|pull| pull.base == branch && pull.head == source);
                if existing {
                    return Ok((BranchOutcome::ConflictPrExists, Some(commit.to_string())));
                }
                let pull = self
                    .forge
                    .create_pr(CreatePrRequest {
                        head: source.to_string(),
                        base: branch.to_string(),
                        title: format!("Merge {} into {}", source, branch),
                        body: Some(
                            "This pull request was automatically generated because \
                             an automated merge hit a merge conflict"
                                .to_string(),
                        ),
                    })
                    .await?;
                let number = pull.number;
                pulls.push(pull);
                Ok((
                    BranchOutcome::ConflictPrCreated { number },
                    Some(commit.to_string()),
                ))
            }
        }
    }
}
