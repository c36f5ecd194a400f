//! git
//!
//! Read-only access to the local repository.
//!
//! # Architecture
//!
//! This module is the only place that imports `git2`. The crate never
//! mutates the local repository: merges happen on the forge. Locally it only
//! needs to know which remote points at the forge.
//!
//! # Example
//!
//! ```no_run
//! use metaship::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! if let Some(url) = git.remote_url("origin")? {
//!     println!("origin is {}", url);
//! }
//! # Ok::<(), metaship::git::GitError>(())
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors from local repository access.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo { path: PathBuf },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    #[error("git error: {message}")]
    Internal { message: String },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Handle to a discovered repository.
pub struct Git {
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("git_dir", &self.repo.path())
            .finish()
    }
}

impl Git {
    /// Open the repository containing `path`.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }
        Ok(Self { repo })
    }

    /// URL of a remote, or `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init() -> (TempDir, git2::Repository) {
        let dir = TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        (dir, repo)
    }

    #[test]
    fn open_outside_repo_fails() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("not-a-repo");
        std::fs::create_dir_all(&nested).unwrap();
        // discover walks upwards; a fresh temp dir has no repository above it
        // on a sane test host, but guard against one anyway.
        if git2::Repository::discover(&nested).is_err() {
            assert!(matches!(Git::open(&nested), Err(GitError::NotARepo { .. })));
        }
    }

    #[test]
    fn remote_url_present_and_missing() {
        let (dir, repo) = init();
        repo.remote("origin", "https://github.com/acme/cumulo.git")
            .unwrap();

        let git = Git::open(dir.path()).unwrap();

        assert_eq!(
            git.remote_url("origin").unwrap().as_deref(),
            Some("https://github.com/acme/cumulo.git")
        );
        assert_eq!(git.remote_url("upstream").unwrap(), None);
    }

    #[test]
    fn opens_from_subdirectory() {
        let (dir, _repo) = init();
        let sub = dir.path().join("force-app");
        std::fs::create_dir_all(&sub).unwrap();
        let git = Git::open(&sub).unwrap();
        assert_eq!(git.remote_url("origin").unwrap(), None);
    }
}
