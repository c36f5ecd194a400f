//! transport
//!
//! Metadata transport: the retrieve/deploy boundary to a target org.
//!
//! # Design
//!
//! A transport moves package archives in and out of an org. Retrieve takes
//! the text of a `package.xml` and returns an archive of the matching
//! members; deploy takes an archive (which must contain `package.xml`) and
//! reports a status. Adapters talking to a real org send and receive the
//! archive as a base64 zip ([`PackageArchive::to_base64_zip`],
//! [`PackageArchive::from_base64_zip`]); the rest of the crate only sees
//! [`PackageArchive`].
//!
//! The trait is async because real transports perform network I/O. Callers
//! await each call before continuing.
//!
//! # Modules
//!
//! - [`archive`]: In-memory archive of a working directory
//! - [`local`]: Directory-backed transport standing in for an org
//! - [`mock`]: Recording transport with canned results for tests

pub mod archive;
pub mod local;
pub mod mock;

pub use archive::PackageArchive;
pub use local::LocalTransport;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid package manifest: {0}")]
    InvalidManifest(String),

    #[error("invalid archive: {0}")]
    Archive(String),

    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TransportError::Io {
            path: path.into(),
            source,
        }
    }
}

/// A retrieve call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrieveRequest {
    /// `package.xml` text naming the members to retrieve
    pub package_xml: String,
    pub api_version: String,
}

/// Options for a deploy call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Validate without committing changes
    pub check_only: bool,
}

/// Final status of a deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployStatus {
    Succeeded,
    Failed { messages: Vec<String> },
}

/// Result of a deploy call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub status: DeployStatus,
    /// Number of component files deployed
    pub components: usize,
}

impl DeployResult {
    pub fn succeeded(components: usize) -> Self {
        Self {
            status: DeployStatus::Succeeded,
            components,
        }
    }

    pub fn failed(messages: Vec<String>) -> Self {
        Self {
            status: DeployStatus::Failed { messages },
            components: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DeployStatus::Succeeded
    }
}

/// Retrieve/deploy boundary to an org.
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    /// Transport name for logging (e.g., "local").
    fn name(&self) -> &'static str;

    /// Retrieve the members named by a `package.xml`.
    async fn retrieve(&self, request: RetrieveRequest) -> Result<PackageArchive, TransportError>;

    /// Deploy an archive containing `package.xml`.
    ///
    /// A rejected deploy is reported through [`DeployStatus::Failed`];
    /// `Err` means the transport itself failed.
    async fn deploy(
        &self,
        archive: PackageArchive,
        options: DeployOptions,
    ) -> Result<DeployResult, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_result_constructors() {
        assert!(DeployResult::succeeded(3).is_success());
        let failed = DeployResult::failed(vec!["bad".to_string()]);
        assert!(!failed.is_success());
        assert_eq!(failed.components, 0);
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            TransportError::InvalidManifest("no types".into()).to_string(),
            "invalid package manifest: no types"
        );
    }
}
