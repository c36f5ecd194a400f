//! engine::etl
//!
//! Retrieve / transform / deploy pipeline.
//!
//! # Design
//!
//! The pipeline owns the sequencing and the working directory; a job owns
//! what is retrieved and how the retrieved files are rewritten.
//!
//! ```text
//! retrieve: job manifest -> package.xml -> transport.retrieve -> extract
//! transform: job.transform(working dir) -> deploy manifest
//! deploy: archive working dir + package.xml -> transport.deploy
//! ```
//!
//! Stages run in that order; a disabled stage is skipped. Each run gets its
//! own temporary working directory unless the caller supplies one.
//!
//! # Invariants
//!
//! - Job configuration is validated before the transport is contacted
//! - A deploy rejected by the org is an error carrying the org's messages
//! - Transport errors propagate without retry

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use tempfile::TempDir;
use thiserror::Error;

use crate::core::naming::NamespaceTemplater;
use crate::metadata::manifest::{MemberSelection, PackagingManifest};
use crate::metadata::transform::{resolve_structured, EntityTransform, EntityTransformEngine};
use crate::metadata::MetadataError;
use crate::transport::{
    DeployOptions, DeployResult, DeployStatus, MetadataTransport, PackageArchive,
    RetrieveRequest, TransportError,
};

const PACKAGE_XML: &str = "package.xml";

/// Errors from a pipeline run.
#[derive(Debug, Error)]
pub enum EtlError {
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("deploy failed: {}", messages.join("; "))]
    DeployFailed { messages: Vec<String> },

    #[error("failed to create working directory: {0}")]
    WorkingDir(std::io::Error),
}

impl EtlError {
    /// Whether the error was caused by job configuration rather than I/O.
    pub fn is_configuration(&self) -> bool {
        match self {
            EtlError::Metadata(e) => e.is_configuration(),
            EtlError::Transport(TransportError::InvalidManifest(_)) => true,
            _ => false,
        }
    }
}

/// Which stages run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EtlStages {
    pub retrieve: bool,
    pub transform: bool,
    pub deploy: bool,
}

impl EtlStages {
    pub const ALL: EtlStages = EtlStages {
        retrieve: true,
        transform: true,
        deploy: true,
    };

    pub const RETRIEVE_ONLY: EtlStages = EtlStages {
        retrieve: true,
        transform: false,
        deploy: false,
    };

    pub const DEPLOY_ONLY: EtlStages = EtlStages {
        retrieve: false,
        transform: false,
        deploy: true,
    };

    /// Transform and deploy without retrieving anything.
    pub const SYNTHESIZE: EtlStages = EtlStages {
        retrieve: false,
        transform: true,
        deploy: true,
    };
}

impl Default for EtlStages {
    fn default() -> Self {
        Self::ALL
    }
}

/// What a pipeline run retrieves and how it rewrites it.
pub trait EtlJob: Send + Sync {
    /// Manifest of the members to retrieve. Also validates the job.
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError>;

    /// Rewrite (or generate) files in the working directory and return the
    /// manifest to deploy.
    fn transform(&self, working_dir: &Path) -> Result<PackagingManifest, MetadataError>;
}

/// Summary of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EtlReport {
    /// Files extracted by the retrieve stage
    pub retrieved: usize,
    /// Manifest produced by the transform stage
    pub manifest: Option<PackagingManifest>,
    /// Result of the deploy stage
    pub deploy: Option<DeployResult>,
    /// Working directory, when supplied by the caller
    pub working_dir: Option<PathBuf>,
}

/// Sequential retrieve / transform / deploy.
pub struct EtlPipeline<'a> {
    transport: &'a dyn MetadataTransport,
    api_version: String,
    stages: EtlStages,
    deploy_options: DeployOptions,
}

impl<'a> EtlPipeline<'a> {
    pub fn new(transport: &'a dyn MetadataTransport, api_version: impl Into<String>) -> Self {
        Self {
            transport,
            api_version: api_version.into(),
            stages: EtlStages::ALL,
            deploy_options: DeployOptions::default(),
        }
    }

    pub fn with_stages(mut self, stages: EtlStages) -> Self {
        self.stages = stages;
        self
    }

    pub fn with_deploy_options(mut self, options: DeployOptions) -> Self {
        self.deploy_options = options;
        self
    }

    pub fn stages(&self) -> EtlStages {
        self.stages
    }

    /// Run the pipeline in a fresh temporary working directory.
    pub async fn run(&self, job: &dyn EtlJob) -> Result<EtlReport, EtlError> {
        let temp = TempDir::new().map_err(EtlError::WorkingDir)?;
        debug!("Working directory: {}", temp.path().display());
        let mut report = self.run_in(job, temp.path()).await?;
        report.working_dir = None;
        Ok(report)
    }

    /// Run the pipeline in a caller-supplied working directory.
    pub async fn run_in(&self, job: &dyn EtlJob, working_dir: &Path) -> Result<EtlReport, EtlError> {
        let mut report = EtlReport {
            working_dir: Some(working_dir.to_path_buf()),
            ..Default::default()
        };

        let retrieve_manifest = if self.stages.retrieve {
            Some(job.retrieve_manifest()?)
        } else {
            None
        };

        if let Some(manifest) = &retrieve_manifest {
            report.retrieved = self.retrieve(manifest, working_dir).await?;
        }

        if self.stages.transform {
            report.manifest = Some(job.transform(working_dir)?);
        }

        if self.stages.deploy {
            let manifest = report.manifest.as_ref().or(retrieve_manifest.as_ref());
            report.deploy = Some(self.deploy(manifest, working_dir).await?);
        }

        Ok(report)
    }

    async fn retrieve(
        &self,
        manifest: &PackagingManifest,
        working_dir: &Path,
    ) -> Result<usize, EtlError> {
        let request = RetrieveRequest {
            package_xml: manifest.to_package_xml(&self.api_version),
            api_version: self.api_version.clone(),
        };
        info!("Retrieving metadata via {}", self.transport.name());
        let archive = self.transport.retrieve(request).await?;
        archive.extract_all(working_dir)?;
        Ok(archive.len())
    }

    /// Write `package.xml` into the working directory, archive the
    /// directory and deploy it.
    ///
    /// Without a manifest, an existing `package.xml` in the directory is used,
    /// or one is discovered from the files present.
    async fn deploy(
        &self,
        manifest: Option<&PackagingManifest>,
        working_dir: &Path,
    ) -> Result<DeployResult, EtlError> {
        let manifest_path = working_dir.join(PACKAGE_XML);
        let package_xml = match manifest {
            Some(manifest) => Some(manifest.to_package_xml(&self.api_version)),
            None if manifest_path.is_file() => None,
            None => Some(PackagingManifest::discover(working_dir)?.to_package_xml(&self.api_version)),
        };
        if let Some(package_xml) = package_xml {
            fs::write(&manifest_path, package_xml)
                .map_err(|e| MetadataError::io(&manifest_path, e))?;
        }
        let archive = PackageArchive::from_dir(working_dir)?;

        info!(
            "Deploying {} files via {}",
            archive.len(),
            self.transport.name()
        );
        let result = self.transport.deploy(archive, self.deploy_options.clone()).await?;
        match &result.status {
            DeployStatus::Succeeded => {
                info!("Deploy succeeded ({} components)", result.components);
                Ok(result)
            }
            DeployStatus::Failed { messages } => Err(EtlError::DeployFailed {
                messages: messages.clone(),
            }),
        }
    }
}

/// A job running one [`EntityTransform`] over a member selection.
pub struct EntityTransformJob {
    transform: Box<dyn EntityTransform>,
    selection: MemberSelection,
    templater: NamespaceTemplater,
}

impl EntityTransformJob {
    pub fn new(
        transform: Box<dyn EntityTransform>,
        selection: MemberSelection,
        templater: NamespaceTemplater,
    ) -> Self {
        Self {
            transform,
            selection,
            templater,
        }
    }

    pub fn selection(&self) -> &MemberSelection {
        &self.selection
    }
}

impl EtlJob for EntityTransformJob {
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
        let entity = resolve_structured(self.transform.entity())?;
        Ok(self.selection.bind(entity.name))
    }

    fn transform(&self, working_dir: &Path) -> Result<PackagingManifest, MetadataError> {
        let engine = EntityTransformEngine::new(self.transform.as_ref(), &self.templater);
        let report = engine.run(working_dir, &self.selection)?;
        info!(
            "Transformed {} {} member(s)",
            report.kept.len(),
            report.entity
        );
        Ok(report.manifest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::layouts::AddRelatedList;
    use crate::metadata::TransformOutcome;
    use crate::metadata::MetadataDocument;
    use crate::transport::mock::{MockOperation, MockTransport};

    const LAYOUT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Layout xmlns=\"http://soap.sforce.com/2006/04/metadata\">\n    <layoutSections>\n        <label>Info</label>\n    </layoutSections>\n</Layout>\n";

    fn layout_archive() -> PackageArchive {
        let mut archive = PackageArchive::new();
        archive.insert("layouts/Account-Account Layout.layout", LAYOUT);
        archive.insert("package.xml", "<Package/>");
        archive
    }

    fn related_list_job(names: Option<&str>) -> EntityTransformJob {
        let templater = NamespaceTemplater::unmanaged();
        let selection = MemberSelection::parse(names, &templater);
        EntityTransformJob::new(
            Box::new(AddRelatedList::new("RelatedContactList")),
            selection,
            templater,
        )
    }

    struct OpaqueJob;

    impl EtlJob for OpaqueJob {
        fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
            resolve_structured("ApexClass").map(|_| PackagingManifest::new())
        }

        fn transform(&self, _: &Path) -> Result<PackagingManifest, MetadataError> {
            Ok(PackagingManifest::new())
        }
    }

    struct RemoveAll;

    impl EntityTransform for RemoveAll {
        fn entity(&self) -> &str {
            "Layout"
        }

        fn transform(
            &self,
            _: &mut MetadataDocument,
            _: &str,
        ) -> Result<TransformOutcome, MetadataError> {
            Ok(TransformOutcome::Remove)
        }
    }

    mod stages {
        use super::*;

        #[tokio::test]
        async fn full_run_retrieves_transforms_and_deploys() {
            let transport = MockTransport::new().with_archive(layout_archive());
            let pipeline = EtlPipeline::new(&transport, "47.0");

            let report = pipeline
                .run(&related_list_job(Some("Account-Account Layout")))
                .await
                .unwrap();

            assert_eq!(report.retrieved, 2);
            assert!(report.deploy.unwrap().is_success());

            let deployed = transport.deployed();
            assert_eq!(deployed.len(), 1);
            let layout = deployed[0]
                .get_text("layouts/Account-Account Layout.layout")
                .unwrap();
            assert!(layout.contains("<relatedList>RelatedContactList</relatedList>"));
            let package = deployed[0].get_text("package.xml").unwrap();
            assert!(package.contains("<members>Account-Account Layout</members>"));
            assert!(package.contains("<name>Layout</name>"));

            match &transport.operations()[0] {
                MockOperation::Retrieve { package_xml } => {
                    assert!(package_xml.contains("<members>Account-Account Layout</members>"));
                }
                other => panic!("expected retrieve, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn disabled_stages_are_skipped() {
            let transport = MockTransport::new().with_archive(layout_archive());
            let pipeline = EtlPipeline::new(&transport, "47.0").with_stages(EtlStages::RETRIEVE_ONLY);
            let dir = tempfile::TempDir::new().unwrap();

            let report = pipeline
                .run_in(&related_list_job(None), dir.path())
                .await
                .unwrap();

            assert!(report.manifest.is_none());
            assert!(report.deploy.is_none());
            assert_eq!(transport.operations().len(), 1);
            let retrieved =
                fs::read_to_string(dir.path().join("layouts/Account-Account Layout.layout"))
                    .unwrap();
            assert_eq!(retrieved, LAYOUT);
        }

        #[tokio::test]
        async fn wildcard_retrieve_manifest() {
            let job = related_list_job(None);
            let manifest = job.retrieve_manifest().unwrap();
            assert_eq!(manifest.members("Layout"), Some(&["*".to_string()][..]));
        }

        #[tokio::test]
        async fn deploy_only_discovers_manifest() {
            let transport = MockTransport::new();
            let pipeline = EtlPipeline::new(&transport, "47.0").with_stages(EtlStages::DEPLOY_ONLY);
            let dir = tempfile::TempDir::new().unwrap();
            fs::create_dir_all(dir.path().join("classes")).unwrap();
            fs::write(dir.path().join("classes/Foo.cls"), "public class Foo {}").unwrap();

            pipeline.run_in(&OpaqueJob, dir.path()).await.unwrap();

            let deployed = transport.deployed();
            let package = deployed[0].get_text("package.xml").unwrap();
            assert!(package.contains("<members>Foo</members>"));
            assert_eq!(fs::read_to_string(dir.path().join("package.xml")).unwrap(), package);
        }

        #[tokio::test]
        async fn deploy_rewrites_retrieved_manifest_on_disk() {
            let transport = MockTransport::new().with_archive(layout_archive());
            let pipeline = EtlPipeline::new(&transport, "47.0");
            let dir = tempfile::TempDir::new().unwrap();

            pipeline
                .run_in(&related_list_job(Some("Account-Account Layout")), dir.path())
                .await
                .unwrap();

            let on_disk = fs::read_to_string(dir.path().join("package.xml")).unwrap();
            let deployed = transport.deployed();
            assert_eq!(deployed[0].get_text("package.xml"), Some(on_disk.as_str()));
            assert_eq!(
                on_disk,
                PackagingManifest::single("Layout", ["Account-Account Layout"]).to_package_xml("47.0")
            );
        }

        #[tokio::test]
        async fn removed_members_leave_the_manifest() {
            let transport = MockTransport::new().with_archive(layout_archive());
            let pipeline = EtlPipeline::new(&transport, "47.0");
            let templater = NamespaceTemplater::unmanaged();
            let job = EntityTransformJob::new(
                Box::new(RemoveAll),
                MemberSelection::parse(None, &templater),
                templater,
            );

            let report = pipeline.run(&job).await.unwrap();

            assert!(report.manifest.unwrap().is_empty());
            let deployed = transport.deployed();
            assert!(!deployed[0].contains("layouts/Account-Account Layout.layout"));
        }
    }

    mod errors {
        use super::*;
        use crate::transport::mock::FailOn;

        #[tokio::test]
        async fn opaque_entity_rejected_before_retrieve() {
            let transport = MockTransport::new();
            let pipeline = EtlPipeline::new(&transport, "47.0");

            let err = pipeline.run(&OpaqueJob).await.unwrap_err();

            assert!(err.is_configuration());
            assert!(transport.operations().is_empty());
        }

        #[tokio::test]
        async fn missing_member_is_configuration_error() {
            let transport = MockTransport::new().with_archive(layout_archive());
            let pipeline = EtlPipeline::new(&transport, "47.0");

            let err = pipeline
                .run(&related_list_job(Some("Contact-Contact Layout")))
                .await
                .unwrap_err();

            assert!(matches!(
                err,
                EtlError::Metadata(MetadataError::MissingMember(_))
            ));
            assert!(transport.deployed().is_empty());
        }

        #[tokio::test]
        async fn failed_deploy_carries_messages() {
            let transport = MockTransport::new()
                .with_archive(layout_archive())
                .with_deploy_result(DeployResult::failed(vec!["Layout: bad field".into()]));
            let pipeline = EtlPipeline::new(&transport, "47.0");

            let err = pipeline.run(&related_list_job(None)).await.unwrap_err();

            assert_eq!(err.to_string(), "deploy failed: Layout: bad field");
        }

        #[tokio::test]
        async fn transport_failure_propagates() {
            let transport = MockTransport::new().fail_on(FailOn::Retrieve);
            let pipeline = EtlPipeline::new(&transport, "47.0");

            let err = pipeline.run(&related_list_job(None)).await.unwrap_err();

            assert!(matches!(err, EtlError::Transport(_)));
        }
    }
}
