//! forge::traits
//!
//! Forge trait definition for interacting with the repository host.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully. Callers await
//! each call before issuing the next; the branch cascade relies on that
//! ordering for its call counts.
//!
//! A merge conflict is not an error: [`Forge::merge`] reports it as
//! [`MergeOutcome::Conflict`] so the caller can fall back to a pull request.
//!
//! # Example
//!
//! ```ignore
//! use metaship::forge::{Forge, MergeOutcome, MergeRequest};
//!
//! async fn sync(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     let source = forge.get_branch("main").await?;
//!     let outcome = forge
//!         .merge(MergeRequest::new("feature/a", &source.sha))
//!         .await?;
//!     if let MergeOutcome::Merged { sha } = outcome {
//!         println!("feature/a is now at {}", sha);
//!     }
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Errors from forge operations.
///
/// These error types map to common failure modes when interacting
/// with remote hosting services like GitHub.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// The operation is not supported by this forge.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

/// Repository information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// `owner/name`
    pub full_name: String,
    /// Branch the host considers the default
    pub default_branch: String,
}

/// A branch and its head commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub sha: String,
}

impl Branch {
    pub fn new(name: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sha: sha.into(),
        }
    }
}

/// Result of comparing two refs (`base...head`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    /// Commits on head not on base
    pub ahead_by: u64,
    /// Commits on base not on head
    pub behind_by: u64,
    /// Paths of files that differ
    pub files: Vec<String>,
}

impl Comparison {
    /// Whether the two refs have no file-level differences.
    pub fn is_identical(&self) -> bool {
        self.files.is_empty()
    }
}

/// Request to merge a commit into a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    /// Branch receiving the merge
    pub base: String,
    /// Commit sha (or branch) being merged
    pub head: String,
    /// Merge commit message (host default when `None`)
    pub commit_message: Option<String>,
}

impl MergeRequest {
    pub fn new(base: impl Into<String>, head: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            head: head.into(),
            commit_message: None,
        }
    }
}

/// Outcome of a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A merge commit was created; `sha` is the branch's new head
    Merged { sha: String },
    /// The branch already contains the commit
    NothingToMerge,
    /// The merge conflicts and needs a human
    Conflict,
}

/// Request to create a pull request.
#[derive(Debug, Clone)]
pub struct CreatePrRequest {
    /// Head branch name (the branch with changes)
    pub head: String,
    /// Base branch name (the branch to merge into)
    pub base: String,
    /// PR title
    pub title: String,
    /// PR body/description
    pub body: Option<String>,
}

/// Pull request information returned from the forge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// PR URL (web URL for viewing)
    pub url: String,
    /// Head branch name
    pub head: String,
    /// Base branch name
    pub base: String,
    /// PR title
    pub title: String,
}

/// The Forge trait for interacting with the repository host.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed`: Configure a token
/// - `NotFound`: Resource doesn't exist
/// - `RateLimited`: Back off and retry later
/// - `ApiError`: Display error message to user
/// - `NetworkError`: Check connectivity
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Look up the repository.
    async fn get_repo(&self) -> Result<Repository, ForgeError>;

    /// Look up one branch.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch doesn't exist
    async fn get_branch(&self, name: &str) -> Result<Branch, ForgeError>;

    /// List all branches, in host order.
    async fn list_branches(&self) -> Result<Vec<Branch>, ForgeError>;

    /// Compare `base...head`.
    async fn compare(&self, base: &str, head: &str) -> Result<Comparison, ForgeError>;

    /// Merge `request.head` into `request.base`.
    ///
    /// Conflicts are reported as [`MergeOutcome::Conflict`], not as errors.
    async fn merge(&self, request: MergeRequest) -> Result<MergeOutcome, ForgeError>;

    /// List open pull requests.
    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError>;

    /// Create a new pull request.
    ///
    /// # Errors
    ///
    /// - `AuthFailed` if the token is invalid or lacks permissions
    /// - `ApiError` with status 422 if validation fails (e.g., head doesn't exist)
    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError>;
}
