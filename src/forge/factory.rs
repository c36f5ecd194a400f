//! forge::factory
//!
//! Forge selection and creation.
//!
//! # Design
//!
//! Commands use [`create_forge`] instead of constructing `GitHubForge`
//! directly. The target repository comes from `[repo]` in the project file
//! when configured, otherwise from the git remote URL. Explicit settings win
//! field by field, so a project can pin only `api_base` and still infer the
//! owner and name from `origin`.
//!
//! # Example
//!
//! ```
//! use metaship::core::config::RepoConfig;
//! use metaship::forge::resolve_target;
//!
//! let target = resolve_target(&RepoConfig::default(), Some("git@github.com:acme/cumulo.git")).unwrap();
//! assert_eq!(target.owner, "acme");
//! assert_eq!(target.repo, "cumulo");
//! ```

use super::github::{parse_github_url, GitHubForge, DEFAULT_API_BASE};
use super::traits::{Forge, ForgeError};
use crate::core::config::RepoConfig;

/// Environment variable holding the hosting token.
pub const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// The repository a forge talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeTarget {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
}

/// Resolve the target repository from configuration and the remote URL.
///
/// # Errors
///
/// `ForgeError::NotFound` if owner or name is neither configured nor
/// derivable from the remote URL.
pub fn resolve_target(
    config: &RepoConfig,
    remote_url: Option<&str>,
) -> Result<ForgeTarget, ForgeError> {
    let parsed = remote_url.and_then(parse_github_url);
    let (parsed_owner, parsed_repo) = match parsed {
        Some((owner, repo)) => (Some(owner), Some(repo)),
        None => (None, None),
    };

    let owner = config.owner.clone().or(parsed_owner);
    let repo = config.name.clone().or(parsed_repo);

    match (owner, repo) {
        (Some(owner), Some(repo)) => Ok(ForgeTarget {
            owner,
            repo,
            api_base: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
        }),
        _ => Err(ForgeError::NotFound(match remote_url {
            Some(url) => format!(
                "Could not parse '{}' as a GitHub URL. \
                 Expected format: git@github.com:owner/repo.git or https://github.com/owner/repo.git; \
                 or set [repo] owner and name",
                url
            ),
            None => "no git remote found; set [repo] owner and name".to_string(),
        })),
    }
}

/// Create a forge for a resolved target.
///
/// # Errors
///
/// `ForgeError::AuthRequired` if no token is available.
pub fn create_forge(
    target: &ForgeTarget,
    token: Option<&str>,
) -> Result<Box<dyn Forge>, ForgeError> {
    let token = token
        .filter(|t| !t.is_empty())
        .ok_or(ForgeError::AuthRequired)?;
    Ok(Box::new(GitHubForge::with_api_base(
        token,
        &target.owner,
        &target.repo,
        &target.api_base,
    )))
}
