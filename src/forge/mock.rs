//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! The mock forge holds a repository snapshot in memory: branches with head
//! commits, per-branch diffs against the source, per-branch merge behavior
//! and open pull requests. Every call is recorded so tests can assert on the
//! exact sequence the cascade issued.
//!
//! # Example
//!
//! ```
//! use metaship::forge::mock::{MockForge, MockMerge};
//! use metaship::forge::{Branch, Forge, MergeOutcome, MergeRequest};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let forge = MockForge::new()
//!     .with_branch(Branch::new("main", "abc"))
//!     .with_branch(Branch::new("feature/a", "def"))
//!     .with_merge("feature/a", MockMerge::Conflict);
//!
//! let outcome = forge.merge(MergeRequest::new("feature/a", "abc")).await.unwrap();
//! assert_eq!(outcome, MergeOutcome::Conflict);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::traits::{
    Branch, Comparison, CreatePrRequest, Forge, ForgeError, MergeOutcome, MergeRequest,
    PullRequest, Repository,
};

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
}

/// Internal mutable state.
#[derive(Debug)]
struct MockForgeInner {
    repository: Repository,
    /// Branches in listing order.
    branches: Vec<Branch>,
    /// Comparison results keyed by base branch.
    comparisons: HashMap<String, Comparison>,
    /// Merge behavior keyed by base branch.
    merges: HashMap<String, MockMerge>,
    /// Open pull requests.
    pulls: Vec<PullRequest>,
    /// Next PR number to assign.
    next_pr_number: u64,
    /// Counter for generated merge commit shas.
    next_merge: u64,
    /// Method to fail on (for testing error paths).
    fail_on: Option<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

/// How a merge into a branch behaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockMerge {
    /// Create a merge commit with a generated sha
    Merged,
    /// Create a merge commit with the given sha
    MergedAs(String),
    /// Report that nothing needed merging
    NothingToMerge,
    /// Report a conflict
    Conflict,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    GetRepo(ForgeError),
    GetBranch(ForgeError),
    ListBranches(ForgeError),
    Compare(ForgeError),
    /// Fail every merge with the given error.
    Merge(ForgeError),
    /// Fail merges into one branch only.
    MergeInto(String, ForgeError),
    ListOpenPulls(ForgeError),
    CreatePr(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRepo,
    GetBranch { name: String },
    ListBranches,
    Compare { base: String, head: String },
    Merge { base: String, head: String },
    ListOpenPulls,
    CreatePr { head: String, base: String, title: String },
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner {
                repository: Repository {
                    full_name: "mock/repo".to_string(),
                    default_branch: "main".to_string(),
                },
                branches: Vec::new(),
                comparisons: HashMap::new(),
                merges: HashMap::new(),
                pulls: Vec::new(),
                next_pr_number: 1,
                next_merge: 1,
                fail_on: None,
                operations: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Add a branch (listing order is insertion order).
    pub fn with_branch(self, branch: Branch) -> Self {
        self.state().branches.push(branch);
        self
    }

    /// Configure the comparison of `branch` against the source head.
    ///
    /// Branches without a configured comparison have no file diffs.
    pub fn with_diff(self, branch: &str, ahead_by: u64, files: &[&str]) -> Self {
        self.state().comparisons.insert(
            branch.to_string(),
            Comparison {
                ahead_by,
                behind_by: 0,
                files: files.iter().map(|f| f.to_string()).collect(),
            },
        );
        self
    }

    /// Configure how merges into `branch` behave (default: [`MockMerge::Merged`]).
    pub fn with_merge(self, branch: &str, merge: MockMerge) -> Self {
        self.state().merges.insert(branch.to_string(), merge);
        self
    }

    /// Add an existing open pull request.
    pub fn with_pull(self, pull: PullRequest) -> Self {
        {
            let mut inner = self.state();
            inner.next_pr_number = inner.next_pr_number.max(pull.number + 1);
            inner.pulls.push(pull);
        }
        self
    }

    /// Configure the mock to fail on a specific operation.
    ///
    /// # Example
    ///
    /// ```
    /// use metaship::forge::mock::{MockForge, FailOn};
    /// use metaship::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::CreatePr(ForgeError::RateLimited));
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    /// Clear the failure configuration.
    pub fn clear_fail_on(&self) {
        self.state().fail_on = None;
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.state().operations.len()
    }

    /// Clear recorded operations.
    pub fn clear_operations(&self) {
        self.state().operations.clear();
    }

    /// All open pull requests (for test verification).
    pub fn pulls(&self) -> Vec<PullRequest> {
        self.state().pulls.clone()
    }

    /// Current head of a branch (for test verification).
    pub fn head(&self, branch: &str) -> Option<String> {
        self.state()
            .branches
            .iter()
            .find(|b| b.name == branch)
            .map(|b| b.sha.clone())
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        self.state().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, op: &MockOperation) -> Result<(), ForgeError> {
        let inner = self.state();
        let error = match (&inner.fail_on, op) {
            (Some(FailOn::GetRepo(e)), MockOperation::GetRepo) => Some(e),
            (Some(FailOn::GetBranch(e)), MockOperation::GetBranch { .. }) => Some(e),
            (Some(FailOn::ListBranches(e)), MockOperation::ListBranches) => Some(e),
            (Some(FailOn::Compare(e)), MockOperation::Compare { .. }) => Some(e),
            (Some(FailOn::Merge(e)), MockOperation::Merge { .. }) => Some(e),
            (Some(FailOn::MergeInto(branch, e)), MockOperation::Merge { base, .. })
                if branch == base =>
            {
                Some(e)
            }
            (Some(FailOn::ListOpenPulls(e)), MockOperation::ListOpenPulls) => Some(e),
            (Some(FailOn::CreatePr(e)), MockOperation::CreatePr { .. }) => Some(e),
            _ => None,
        };
        match error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    /// Record and check for a configured failure.
    fn call(&self, op: MockOperation) -> Result<(), ForgeError> {
        self.record(op.clone());
        self.check_fail(&op)
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn get_repo(&self) -> Result<Repository, ForgeError> {
        self.call(MockOperation::GetRepo)?;
        Ok(self.state().repository.clone())
    }

    async fn get_branch(&self, name: &str) -> Result<Branch, ForgeError> {
        self.call(MockOperation::GetBranch {
            name: name.to_string(),
        })?;
        self.state()
            .branches
            .iter()
            .find(|b| b.name == name)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound(format!("Branch not found: {}", name)))
    }

    async fn list_branches(&self) -> Result<Vec<Branch>, ForgeError> {
        self.call(MockOperation::ListBranches)?;
        Ok(self.state().branches.clone())
    }

    async fn compare(&self, base: &str, head: &str) -> Result<Comparison, ForgeError> {
        self.call(MockOperation::Compare {
            base: base.to_string(),
            head: head.to_string(),
        })?;
        Ok(self
            .state()
            .comparisons
            .get(base)
            .cloned()
            .unwrap_or_default())
    }

    async fn merge(&self, request: MergeRequest) -> Result<MergeOutcome, ForgeError> {
        self.call(MockOperation::Merge {
            base: request.base.clone(),
            head: request.head.clone(),
        })?;

        let mut inner = self.state();
        if !inner.branches.iter().any(|b| b.name == request.base) {
            return Err(ForgeError::NotFound(format!("Base does not exist: {}", request.base)));
        }

        let behavior = inner
            .merges
            .get(&request.base)
            .cloned()
            .unwrap_or(MockMerge::Merged);
        let sha = match behavior {
            MockMerge::NothingToMerge => return Ok(MergeOutcome::NothingToMerge),
            MockMerge::Conflict => return Ok(MergeOutcome::Conflict),
            MockMerge::MergedAs(sha) => sha,
            MockMerge::Merged => {
                let n = inner.next_merge;
                inner.next_merge += 1;
                format!("merge-{}", n)
            }
        };

        if let Some(branch) = inner.branches.iter_mut().find(|b| b.name == request.base) {
            branch.sha = sha.clone();
        }
        Ok(MergeOutcome::Merged { sha })
    }

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError> {
        self.call(MockOperation::ListOpenPulls)?;
        Ok(self.state().pulls.clone())
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        self.call(MockOperation::CreatePr {
            head: request.head.clone(),
            base: request.base.clone(),
            title: request.title.clone(),
        })?;

        let mut inner = self.state();
        let number = inner.next_pr_number;
        inner.next_pr_number += 1;

        let pr = PullRequest {
            number,
            url: format!("https://github.com/mock/repo/pull/{}", number),
            head: request.head,
            base: request.base,
            title: request.title,
        };
        inner.pulls.push(pr.clone());
        Ok(pr)
    }
}
