//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Design
//!
//! This module implements the `Forge` trait for GitHub's REST v3 API.
//! Every method issues exactly one request, except the list endpoints which
//! page through results 100 at a time until a short page is returned.
//!
//! # Merges
//!
//! `POST /repos/{owner}/{repo}/merges` answers:
//! - 201 with the merge commit → [`MergeOutcome::Merged`]
//! - 204 when the base already contains the head → [`MergeOutcome::NothingToMerge`]
//! - 409 on conflict → [`MergeOutcome::Conflict`]
//!
//! # Rate Limiting
//!
//! Returns `ForgeError::RateLimited` when limits are hit. There is no
//! automatic retry.
//!
//! # Example
//!
//! ```ignore
//! use metaship::forge::github::GitHubForge;
//! use metaship::forge::Forge;
//!
//! let forge = GitHubForge::new("ghp_xxx", "octocat", "hello-world");
//! let branches = forge.list_branches().await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::{
    Branch, Comparison, CreatePrRequest, Forge, ForgeError, MergeOutcome, MergeRequest,
    PullRequest, Repository,
};

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "metaship-cli";

/// GitHub's maximum page size.
const PER_PAGE: usize = 100;

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Personal access token or app token
    token: String,
    /// Repository owner (user or organization)
    owner: String,
    /// Repository name
    repo: String,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl GitHubForge {
    /// Create a GitHub forge against api.github.com.
    pub fn new(token: impl Into<String>, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self::with_api_base(token, owner, repo, DEFAULT_API_BASE)
    }

    /// Create a GitHub forge with a custom API base URL.
    ///
    /// Use this for GitHub Enterprise (`https://github.example.com/api/v3`)
    /// or for pointing at a local HTTP stub.
    pub fn with_api_base(
        token: impl Into<String>,
        owner: impl Into<String>,
        repo: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        let api_base: String = api_base.into();
        Self {
            client: Client::new(),
            token: token.into(),
            owner: owner.into(),
            repo: repo.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    /// Get the repository owner.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Get the repository name.
    pub fn repo(&self) -> &str {
        &self.repo
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Build URL for a repository endpoint.
    fn repo_url(&self, path: &str) -> String {
        if path.is_empty() {
            format!("{}/repos/{}/{}", self.api_base, self.owner, self.repo)
        } else {
            format!(
                "{}/repos/{}/{}/{}",
                self.api_base, self.owner, self.repo, path
            )
        }
    }

    /// Build URL for a repository endpoint whose path carries git refs.
    ///
    /// Every `/`-separated piece is percent-encoded on its own, so a ref
    /// like `feature/fix#12` keeps its slash while `#` becomes `%23`.
    fn ref_url(&self, path: &str) -> Result<Url, ForgeError> {
        let mut url = Url::parse(&self.repo_url(""))
            .map_err(|e| ForgeError::NetworkError(format!("invalid API base: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ForgeError::NetworkError("API base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(path.split('/'));
        Ok(url)
    }

    /// Attach headers and send.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ForgeError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ForgeError> {
        let response = self.send(self.client.get(url)).await?;
        self.handle_response(response).await
    }

    /// Fetch every page of a list endpoint.
    async fn get_paged<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>, ForgeError> {
        let separator = if url.contains('?') { '&' } else { '?' };
        let mut all = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_url = format!("{}{}per_page={}&page={}", url, separator, PER_PAGE, page);
            let items: Vec<T> = self.get_json(&page_url).await?;
            let count = items.len();
            all.extend(items);

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            Err(self.error_from_response(response, status).await)
        }
    }

    /// Map an error response from the API.
    async fn error_from_response(&self, response: Response, status: StatusCode) -> ForgeError {
        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN => ForgeError::AuthFailed(format!("Permission denied: {}", message)),
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn get_repo(&self) -> Result<Repository, ForgeError> {
        let repo: GitHubRepository = self.get_json(&self.repo_url("")).await?;
        Ok(repo.into())
    }

    async fn get_branch(&self, name: &str) -> Result<Branch, ForgeError> {
        let branch: GitHubBranch = self
            .get_json(self.ref_url(&format!("branches/{}", name))?.as_str())
            .await?;
        Ok(branch.into())
    }

    async fn list_branches(&self) -> Result<Vec<Branch>, ForgeError> {
        let branches: Vec<GitHubBranch> = self.get_paged(&self.repo_url("branches")).await?;
        Ok(branches.into_iter().map(Into::into).collect())
    }

    async fn compare(&self, base: &str, head: &str) -> Result<Comparison, ForgeError> {
        let comparison: GitHubComparison = self
            .get_json(self.ref_url(&format!("compare/{}...{}", base, head))?.as_str())
            .await?;
        Ok(comparison.into())
    }

    async fn merge(&self, request: MergeRequest) -> Result<MergeOutcome, ForgeError> {
        let body = MergeBody {
            base: &request.base,
            head: &request.head,
            commit_message: request.commit_message.as_deref(),
        };

        let response = self
            .send(self.client.post(self.repo_url("merges")).json(&body))
            .await?;

        match response.status() {
            StatusCode::CREATED => {
                let commit: GitHubCommit = self.handle_response(response).await?;
                Ok(MergeOutcome::Merged { sha: commit.sha })
            }
            StatusCode::NO_CONTENT => Ok(MergeOutcome::NothingToMerge),
            StatusCode::CONFLICT => Ok(MergeOutcome::Conflict),
            status if status.is_success() => Ok(MergeOutcome::NothingToMerge),
            status => Err(self.error_from_response(response, status).await),
        }
    }

    async fn list_open_pulls(&self) -> Result<Vec<PullRequest>, ForgeError> {
        let pulls: Vec<GitHubPullRequest> =
            self.get_paged(&self.repo_url("pulls?state=open")).await?;
        Ok(pulls.into_iter().map(Into::into).collect())
    }

    async fn create_pr(&self, request: CreatePrRequest) -> Result<PullRequest, ForgeError> {
        let body = CreatePrBody {
            head: &request.head,
            base: &request.base,
            title: &request.title,
            body: request.body.as_deref(),
        };

        let response = self
            .send(self.client.post(self.repo_url("pulls")).json(&body))
            .await?;
        let pr: GitHubPullRequest = self.handle_response(response).await?;
        Ok(pr.into())
    }
}

// --------------------------------------------------------------------------
// API Request/Response Types
// --------------------------------------------------------------------------

/// Request body for creating a PR.
#[derive(Serialize)]
struct CreatePrBody<'a> {
    head: &'a str,
    base: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a str>,
}

/// Request body for a branch merge.
#[derive(Serialize)]
struct MergeBody<'a> {
    base: &'a str,
    head: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_message: Option<&'a str>,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct GitHubRepository {
    full_name: String,
    default_branch: String,
}

impl From<GitHubRepository> for Repository {
    fn from(gh: GitHubRepository) -> Self {
        Repository {
            full_name: gh.full_name,
            default_branch: gh.default_branch,
        }
    }
}

#[derive(Deserialize)]
struct GitHubBranch {
    name: String,
    commit: GitHubCommit,
}

#[derive(Deserialize)]
struct GitHubCommit {
    sha: String,
}

impl From<GitHubBranch> for Branch {
    fn from(gh: GitHubBranch) -> Self {
        Branch {
            name: gh.name,
            sha: gh.commit.sha,
        }
    }
}

#[derive(Deserialize)]
struct GitHubComparison {
    #[serde(default)]
    ahead_by: u64,
    #[serde(default)]
    behind_by: u64,
    #[serde(default)]
    files: Vec<GitHubFile>,
}

#[derive(Deserialize)]
struct GitHubFile {
    filename: String,
}

impl From<GitHubComparison> for Comparison {
    fn from(gh: GitHubComparison) -> Self {
        Comparison {
            ahead_by: gh.ahead_by,
            behind_by: gh.behind_by,
            files: gh.files.into_iter().map(|f| f.filename).collect(),
        }
    }
}

/// GitHub PR response format (subset).
#[derive(Deserialize)]
struct GitHubPullRequest {
    number: u64,
    html_url: String,
    title: String,
    head: GitHubRef,
    base: GitHubRef,
}

/// GitHub ref (head/base) format.
#[derive(Deserialize)]
struct GitHubRef {
    #[serde(rename = "ref")]
    ref_name: String,
}

impl From<GitHubPullRequest> for PullRequest {
    fn from(gh: GitHubPullRequest) -> Self {
        PullRequest {
            number: gh.number,
            url: gh.html_url,
            head: gh.head.ref_name,
            base: gh.base.ref_name,
            title: gh.title,
        }
    }
}

/// Parse a GitHub remote URL into (owner, repo).
///
/// Supports both SSH and HTTPS formats:
/// - `git@github.com:owner/repo.git`
/// - `https://github.com/owner/repo.git`
/// - `https://github.com/owner/repo`
///
/// # Example
///
/// ```
/// use metaship::forge::github::parse_github_url;
///
/// let (owner, repo) = parse_github_url("git@github.com:octocat/hello-world.git").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// ```
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    // SSH format: git@github.com:owner/repo.git
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let parts: Vec<&str> = rest.splitn(2, '/').collect();
        if parts.len() == 2 {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }
    }

    // HTTPS format: https://github.com/owner/repo.git
    if let Some(rest) = url
        .strip_prefix("https://github.com/")
        .or_else(|| url.strip_prefix("http://github.com/"))
    {
        let rest = rest.strip_suffix(".git").unwrap_or(rest);
        let parts: Vec<&str> = rest.splitn(2, '/').collect();
        if parts.len() == 2 && !parts[1].is_empty() {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }
    }

    None
}
