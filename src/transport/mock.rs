//! transport::mock
//!
//! Recording transport for tests.
//!
//! Retrieve returns a canned archive; deploy returns a canned status and
//! keeps every archive it was handed so tests can inspect the payload.
//! Archives pass through the base64 zip wire encoding in both directions,
//! as they would against a real org.

use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{
    DeployOptions, DeployResult, MetadataTransport, PackageArchive, RetrieveRequest,
    TransportError,
};

/// Mock transport. Clones share state.
#[derive(Debug, Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

#[derive(Debug)]
struct MockTransportInner {
    archive: PackageArchive,
    deploy_result: Option<DeployResult>,
    fail_on: Option<FailOn>,
    operations: Vec<MockOperation>,
    payloads: Vec<String>,
    deployed: Vec<PackageArchive>,
}

/// Which call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Retrieve,
    Deploy,
}

/// Recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Retrieve { package_xml: String },
    Deploy { files: usize, check_only: bool },
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockTransportInner {
                archive: PackageArchive::new(),
                deploy_result: None,
                fail_on: None,
                operations: Vec::new(),
                payloads: Vec::new(),
                deployed: Vec::new(),
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockTransportInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Archive returned by every retrieve.
    pub fn with_archive(self, archive: PackageArchive) -> Self {
        self.state().archive = archive;
        self
    }

    /// Result returned by every deploy (default: success with the file count).
    pub fn with_deploy_result(self, result: DeployResult) -> Self {
        self.state().deploy_result = Some(result);
        self
    }

    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.state().fail_on = Some(fail_on);
        self
    }

    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Encoded deploy payloads, in call order.
    pub fn payloads(&self) -> Vec<String> {
        self.state().payloads.clone()
    }

    /// Archives passed to deploy, in call order.
    pub fn deployed(&self) -> Vec<PackageArchive> {
        self.state().deployed.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataTransport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn retrieve(&self, request: RetrieveRequest) -> Result<PackageArchive, TransportError> {
        let mut inner = self.state();
        inner.operations.push(MockOperation::Retrieve {
            package_xml: request.package_xml,
        });
        if inner.fail_on == Some(FailOn::Retrieve) {
            return Err(TransportError::Unavailable("mock retrieve failure".into()));
        }
        let payload = inner.archive.to_base64_zip()?;
        PackageArchive::from_base64_zip(&payload)
    }

    async fn deploy(
        &self,
        archive: PackageArchive,
        options: DeployOptions,
    ) -> Result<DeployResult, TransportError> {
        let mut inner = self.state();
        inner.operations.push(MockOperation::Deploy {
            files: archive.len(),
            check_only: options.check_only,
        });
        if inner.fail_on == Some(FailOn::Deploy) {
            return Err(TransportError::Unavailable("mock deploy failure".into()));
        }
        let payload = archive.to_base64_zip()?;
        let received = PackageArchive::from_base64_zip(&payload)?;
        let result = inner
            .deploy_result
            .clone()
            .unwrap_or_else(|| DeployResult::succeeded(received.len().saturating_sub(1)));
        inner.payloads.push(payload);
        inner.deployed.push(received);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_calls() {
        let mut archive = PackageArchive::new();
        archive.insert("layouts/A.layout", "<Layout/>");
        let transport = MockTransport::new().with_archive(archive.clone());

        let retrieved = transport
            .retrieve(RetrieveRequest {
                package_xml: "<Package/>".into(),
                api_version: "47.0".into(),
            })
            .await
            .unwrap();
        assert_eq!(retrieved, archive);

        let result = transport
            .deploy(archive.clone(), DeployOptions::default())
            .await
            .unwrap();
        assert!(result.is_success());

        assert_eq!(
            transport.operations(),
            vec![
                MockOperation::Retrieve {
                    package_xml: "<Package/>".into()
                },
                MockOperation::Deploy {
                    files: 1,
                    check_only: false
                },
            ]
        );
        assert_eq!(transport.deployed(), vec![archive.clone()]);
        let payloads = transport.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(PackageArchive::from_base64_zip(&payloads[0]).unwrap(), archive);
    }

    #[tokio::test]
    async fn fail_on_deploy() {
        let transport = MockTransport::new().fail_on(FailOn::Deploy);
        let result = transport
            .deploy(PackageArchive::new(), DeployOptions::default())
            .await;
        assert!(matches!(result, Err(TransportError::Unavailable(_))));
        assert!(transport.deployed().is_empty());
    }
}
