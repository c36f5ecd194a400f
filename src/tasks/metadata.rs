//! tasks::metadata
//!
//! Tasks that move metadata through an org via the ETL pipeline.
//!
//! | key | stages |
//! |---|---|
//! | `add_related_lists` | retrieve, transform, deploy |
//! | `add_permission_set_perms` | retrieve, transform, deploy |
//! | `install_package_version` | transform (synthesis), deploy |
//! | `uninstall_package` | transform (synthesis), deploy |
//! | `create_package` | transform (synthesis), deploy |
//! | `deploy` | deploy |
//! | `deploy_bundles` | deploy, once per bundle |
//! | `retrieve_unpackaged` | retrieve |

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::info;
use tempfile::TempDir;

use super::options::{OptionSpec, TaskOptions};
use super::{or_project, BundleReport, Task, TaskContext, TaskError, TaskOutput};
use crate::core::config::{Config, ConfigError};
use crate::core::naming::NamespaceTemplater;
use crate::core::types::VersionNumber;
use crate::engine::{EntityTransformJob, EtlError, EtlJob, EtlPipeline, EtlReport, EtlStages};
use crate::metadata::layouts::AddRelatedList;
use crate::metadata::manifest::{MemberSelection, PackagingManifest};
use crate::metadata::permissions::{AddPermissionSetPermissions, FieldAccess};
use crate::metadata::{MetadataDocument, MetadataError};
use crate::transport::{DeployOptions, PackageArchive};

const DESTRUCTIVE_CHANGES: &str = "destructiveChanges.xml";

/// Options shared by every entity transform task.
const TRANSFORM_OPTIONS: [OptionSpec; 4] = [
    OptionSpec::optional(
        "api_names",
        "Comma-separated member names to transform. Defaults to all members",
    ),
    OptionSpec::optional(
        "namespace_inject",
        "Namespace substituted for %%%NAMESPACE%%% tokens. Defaults to package.namespace",
    ),
    OptionSpec::with_default(
        "unmanaged",
        "true",
        "If false, tokens are replaced with the namespace instead of removed",
    ),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

pub(super) const ADD_RELATED_LISTS_OPTIONS: &[OptionSpec] = &[
    TRANSFORM_OPTIONS[0],
    TRANSFORM_OPTIONS[1],
    TRANSFORM_OPTIONS[2],
    TRANSFORM_OPTIONS[3],
    OptionSpec::required("related_list", "Name of the related list to add"),
    OptionSpec::optional("fields", "Comma-separated fields shown in the related list"),
    OptionSpec::optional(
        "excluded_buttons",
        "Comma-separated standard buttons to hide",
    ),
    OptionSpec::optional("custom_buttons", "Comma-separated custom buttons to show"),
];

pub(super) const ADD_PERMISSION_SET_PERMS_OPTIONS: &[OptionSpec] = &[
    TRANSFORM_OPTIONS[0],
    TRANSFORM_OPTIONS[1],
    TRANSFORM_OPTIONS[2],
    TRANSFORM_OPTIONS[3],
    OptionSpec::optional(
        "field_permissions",
        "Comma-separated fields as Object.Field__c, optionally suffixed :read or :edit",
    ),
    OptionSpec::optional("class_accesses", "Comma-separated Apex classes to enable"),
];

pub(super) const INSTALL_PACKAGE_VERSION_OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional(
        "namespace",
        "Namespace of the package to install. Defaults to package.namespace",
    ),
    OptionSpec::required("version", "Version of the package to install (major.minor)"),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

pub(super) const UNINSTALL_PACKAGE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional(
        "namespace",
        "Namespace of the package to uninstall. Defaults to package.namespace",
    ),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

pub(super) const CREATE_PACKAGE_OPTIONS: &[OptionSpec] = &[
    OptionSpec::optional(
        "package",
        "Name of the package to create. Defaults to package.name",
    ),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

pub(super) const DEPLOY_BUNDLES_OPTIONS: &[OptionSpec] = &[
    OptionSpec::required(
        "path",
        "Directory whose subdirectories are deployed one by one, relative to the project root",
    ),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

pub(super) const DEPLOY_OPTIONS: &[OptionSpec] = &[
    OptionSpec::with_default(
        "path",
        "src",
        "Metadata source directory, relative to the project root",
    ),
    OptionSpec::with_default(
        "check_only",
        "false",
        "Validate the deploy without committing it",
    ),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

pub(super) const RETRIEVE_UNPACKAGED_OPTIONS: &[OptionSpec] = &[
    OptionSpec::required(
        "package_xml",
        "Path to the package.xml naming the metadata to retrieve",
    ),
    OptionSpec::required(
        "path",
        "Directory the retrieved metadata is written to, relative to the project root",
    ),
    OptionSpec::optional(
        "api_version",
        "Metadata API version. Defaults to package.api_version",
    ),
];

/// Templater configured from `namespace_inject` / `unmanaged`.
fn templater(options: &TaskOptions, config: &Config) -> Result<NamespaceTemplater, TaskError> {
    let namespace = options.get("namespace_inject").or(config.namespace());
    let unmanaged = options.flag("unmanaged")?;
    Ok(NamespaceTemplater::new(namespace, unmanaged))
}

fn api_version(options: &TaskOptions, config: &Config) -> String {
    or_project(options, "api_version", config.api_version()).to_string()
}

pub(super) fn build_add_related_lists(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let templater = templater(options, config)?;
    let inject_all = |name: &str| -> Vec<String> {
        options
            .list(name)
            .iter()
            .map(|item| templater.inject(item))
            .collect()
    };

    let transform = AddRelatedList::new(templater.inject(options.require("related_list")?))
        .with_fields(inject_all("fields"))
        .with_excluded_buttons(options.list("excluded_buttons"))
        .with_custom_buttons(inject_all("custom_buttons"));
    let selection = MemberSelection::parse(options.get("api_names"), &templater);

    Ok(Box::new(TransformTask {
        key: "add_related_lists",
        api_version: api_version(options, config),
        job: EntityTransformJob::new(Box::new(transform), selection, templater),
    }))
}

pub(super) fn build_add_permission_set_perms(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let templater = templater(options, config)?;
    let fields: Vec<FieldAccess> = options
        .parsed_list::<FieldAccess>("field_permissions")?
        .into_iter()
        .map(|access| FieldAccess {
            field: templater.inject(&access.field),
            editable: access.editable,
        })
        .collect();
    let classes: Vec<String> = options
        .list("class_accesses")
        .iter()
        .map(|class| templater.inject(class))
        .collect();
    if fields.is_empty() && classes.is_empty() {
        return Err(options
            .invalid(
                "field_permissions",
                "at least one of field_permissions or class_accesses is required",
            )
            .into());
    }

    let selection = MemberSelection::parse(options.get("api_names"), &templater);
    Ok(Box::new(TransformTask {
        key: "add_permission_set_perms",
        api_version: api_version(options, config),
        job: EntityTransformJob::new(
            Box::new(AddPermissionSetPermissions::new(fields, classes)),
            selection,
            templater,
        ),
    }))
}

/// Retrieve, transform and deploy one entity type.
struct TransformTask {
    key: &'static str,
    api_version: String,
    job: EntityTransformJob,
}

#[async_trait]
impl Task for TransformTask {
    fn key(&self) -> &'static str {
        self.key
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let pipeline = EtlPipeline::new(ctx.transport(self.key)?, self.api_version.as_str());
        run_pipeline(&pipeline, &self.job, ctx).await
    }
}

async fn run_pipeline(
    pipeline: &EtlPipeline<'_>,
    job: &dyn EtlJob,
    ctx: &TaskContext<'_>,
) -> Result<TaskOutput, TaskError> {
    let report = match ctx.working_dir() {
        Some(dir) => pipeline.run_in(job, dir).await?,
        None => pipeline.run(job).await?,
    };
    Ok(TaskOutput::Etl(report))
}

pub(super) fn build_install_package_version(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let namespace = namespace(options, config)?;
    let version = options.require("version")?;
    version
        .parse::<VersionNumber>()
        .map_err(|e| options.invalid("version", &e.to_string()))?;

    Ok(Box::new(InstallPackageVersion {
        api_version: api_version(options, config),
        job: InstalledPackageJob {
            namespace,
            version: version.to_string(),
        },
    }))
}

/// Generates `installedPackages/<namespace>.installedPackage`.
#[derive(Debug)]
struct InstalledPackageJob {
    namespace: String,
    version: String,
}

impl InstalledPackageJob {
    fn document(&self) -> Result<String, MetadataError> {
        let mut document = MetadataDocument::new("InstalledPackage")?;
        let version = document.build_element("versionNumber", &[])?;
        document.set_text(version, &self.version)?;
        document.insert_top_level(0, version)?;
        document.to_xml_string()
    }
}

impl EtlJob for InstalledPackageJob {
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
        Ok(PackagingManifest::new())
    }

    fn transform(&self, working_dir: &Path) -> Result<PackagingManifest, MetadataError> {
        let dir = working_dir.join("installedPackages");
        fs::create_dir_all(&dir).map_err(|e| MetadataError::io(&dir, e))?;
        let path = dir.join(format!("{}.installedPackage", self.namespace));
        fs::write(&path, self.document()?).map_err(|e| MetadataError::io(&path, e))?;
        info!("Installing {} version {}", self.namespace, self.version);
        Ok(PackagingManifest::single("InstalledPackage", [self.namespace.as_str()]))
    }
}

struct InstallPackageVersion {
    api_version: String,
    job: InstalledPackageJob,
}

#[async_trait]
impl Task for InstallPackageVersion {
    fn key(&self) -> &'static str {
        "install_package_version"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let pipeline = EtlPipeline::new(ctx.transport(self.key())?, self.api_version.as_str())
            .with_stages(EtlStages::SYNTHESIZE);
        run_pipeline(&pipeline, &self.job, ctx).await
    }
}

/// The `namespace` option, falling back to the project namespace.
fn namespace(options: &TaskOptions, config: &Config) -> Result<String, ConfigError> {
    options
        .get("namespace")
        .or(config.namespace())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingOption {
            task: options.task().to_string(),
            option: "namespace".to_string(),
        })
}

pub(super) fn build_uninstall_package(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let api_version = api_version(options, config);
    Ok(Box::new(UninstallPackage {
        job: UninstallPackageJob {
            namespace: namespace(options, config)?,
            api_version: api_version.clone(),
        },
        api_version,
    }))
}

/// Generates a `destructiveChanges.xml` removing an installed package.
#[derive(Debug)]
struct UninstallPackageJob {
    namespace: String,
    api_version: String,
}

impl EtlJob for UninstallPackageJob {
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
        Ok(PackagingManifest::new())
    }

    fn transform(&self, working_dir: &Path) -> Result<PackagingManifest, MetadataError> {
        let path = working_dir.join(DESTRUCTIVE_CHANGES);
        let destructive = PackagingManifest::single("InstalledPackage", [self.namespace.as_str()]);
        fs::write(&path, destructive.to_package_xml(&self.api_version))
            .map_err(|e| MetadataError::io(&path, e))?;
        info!("Uninstalling {}", self.namespace);
        Ok(PackagingManifest::new())
    }
}

struct UninstallPackage {
    api_version: String,
    job: UninstallPackageJob,
}

#[async_trait]
impl Task for UninstallPackage {
    fn key(&self) -> &'static str {
        "uninstall_package"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let pipeline = EtlPipeline::new(ctx.transport(self.key())?, self.api_version.as_str())
            .with_stages(EtlStages::SYNTHESIZE);
        run_pipeline(&pipeline, &self.job, ctx).await
    }
}

pub(super) fn build_create_package(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    let package = options
        .get("package")
        .or(config.package_name())
        .ok_or_else(|| ConfigError::MissingOption {
            task: options.task().to_string(),
            option: "package".to_string(),
        })?;
    Ok(Box::new(CreatePackage {
        api_version: api_version(options, config),
        job: CreatePackageJob {
            package: package.to_string(),
        },
    }))
}

/// Deploys an empty manifest naming a package, which creates it.
#[derive(Debug)]
struct CreatePackageJob {
    package: String,
}

impl EtlJob for CreatePackageJob {
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
        Ok(PackagingManifest::new())
    }

    fn transform(&self, _: &Path) -> Result<PackagingManifest, MetadataError> {
        info!("Creating package {}", self.package);
        Ok(PackagingManifest::new().with_full_name(self.package.as_str()))
    }
}

struct CreatePackage {
    api_version: String,
    job: CreatePackageJob,
}

#[async_trait]
impl Task for CreatePackage {
    fn key(&self) -> &'static str {
        "create_package"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let pipeline = EtlPipeline::new(ctx.transport(self.key())?, self.api_version.as_str())
            .with_stages(EtlStages::SYNTHESIZE);
        run_pipeline(&pipeline, &self.job, ctx).await
    }
}

/// Deploys a directory as it is on disk.
struct DirectoryJob;

impl EtlJob for DirectoryJob {
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
        Ok(PackagingManifest::new())
    }

    fn transform(&self, working_dir: &Path) -> Result<PackagingManifest, MetadataError> {
        PackagingManifest::discover(working_dir)
    }
}

/// Deploy a source directory from a scratch copy.
///
/// The deploy stage writes `package.xml` into its working directory; the
/// copy keeps that out of the source tree.
async fn deploy_directory(
    pipeline: &EtlPipeline<'_>,
    source: &Path,
) -> Result<EtlReport, TaskError> {
    if !source.is_dir() {
        return Err(MetadataError::MissingMember(source.to_path_buf()).into());
    }
    let staging = TempDir::new().map_err(EtlError::WorkingDir)?;
    PackageArchive::from_dir(source)?.extract_all(staging.path())?;
    let mut report = pipeline.run_in(&DirectoryJob, staging.path()).await?;
    report.working_dir = None;
    Ok(report)
}

pub(super) fn build_deploy(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    Ok(Box::new(Deploy {
        path: config.root().join(options.require("path")?),
        check_only: options.flag("check_only")?,
        api_version: api_version(options, config),
    }))
}

struct Deploy {
    path: PathBuf,
    check_only: bool,
    api_version: String,
}

#[async_trait]
impl Task for Deploy {
    fn key(&self) -> &'static str {
        "deploy"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let pipeline = EtlPipeline::new(ctx.transport(self.key())?, self.api_version.as_str())
            .with_stages(EtlStages::DEPLOY_ONLY)
            .with_deploy_options(DeployOptions {
                check_only: self.check_only,
            });
        let report = deploy_directory(&pipeline, &self.path).await?;
        Ok(TaskOutput::Etl(report))
    }
}

pub(super) fn build_deploy_bundles(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    Ok(Box::new(DeployBundles {
        path: config.root().join(options.require("path")?),
        api_version: api_version(options, config),
    }))
}

/// Deploys every subdirectory of `path` on its own, in name order.
struct DeployBundles {
    path: PathBuf,
    api_version: String,
}

impl DeployBundles {
    fn bundles(&self) -> Result<Vec<(String, PathBuf)>, MetadataError> {
        if !self.path.is_dir() {
            return Err(MetadataError::MissingMember(self.path.clone()));
        }
        let entries = fs::read_dir(&self.path).map_err(|e| MetadataError::io(&self.path, e))?;
        let mut bundles = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MetadataError::io(&self.path, e))?;
            let path = entry.path();
            if path.is_dir() {
                bundles.push((entry.file_name().to_string_lossy().into_owned(), path));
            }
        }
        bundles.sort();
        Ok(bundles)
    }
}

#[async_trait]
impl Task for DeployBundles {
    fn key(&self) -> &'static str {
        "deploy_bundles"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let bundles = self.bundles()?;
        let pipeline = EtlPipeline::new(ctx.transport(self.key())?, self.api_version.as_str())
            .with_stages(EtlStages::DEPLOY_ONLY);

        info!("Deploying all metadata bundles in path {}", self.path.display());
        let mut reports = Vec::with_capacity(bundles.len());
        for (name, path) in bundles {
            info!("Deploying bundle: {}", name);
            let report = deploy_directory(&pipeline, &path).await?;
            reports.push(BundleReport { name, report });
        }
        Ok(TaskOutput::Bundles(reports))
    }
}

/// Retrieves exactly what a `package.xml` names.
struct ManifestJob {
    manifest: PackagingManifest,
}

impl EtlJob for ManifestJob {
    fn retrieve_manifest(&self) -> Result<PackagingManifest, MetadataError> {
        Ok(self.manifest.clone())
    }

    fn transform(&self, _: &Path) -> Result<PackagingManifest, MetadataError> {
        Ok(self.manifest.clone())
    }
}

pub(super) fn build_retrieve_unpackaged(
    options: &TaskOptions,
    config: &Config,
) -> Result<Box<dyn Task>, TaskError> {
    Ok(Box::new(RetrieveUnpackaged {
        package_xml: config.root().join(options.require("package_xml")?),
        path: config.root().join(options.require("path")?),
        api_version: api_version(options, config),
    }))
}

struct RetrieveUnpackaged {
    package_xml: PathBuf,
    path: PathBuf,
    api_version: String,
}

#[async_trait]
impl Task for RetrieveUnpackaged {
    fn key(&self) -> &'static str {
        "retrieve_unpackaged"
    }

    async fn run(&self, ctx: &TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let text = fs::read_to_string(&self.package_xml)
            .map_err(|e| MetadataError::io(&self.package_xml, e))?;
        let job = ManifestJob {
            manifest: PackagingManifest::from_package_xml(&text)?,
        };
        fs::create_dir_all(&self.path).map_err(|e| MetadataError::io(&self.path, e))?;

        let pipeline = EtlPipeline::new(ctx.transport(self.key())?, self.api_version.as_str())
            .with_stages(EtlStages::RETRIEVE_ONLY);
        let report = pipeline.run_in(&job, &self.path).await?;
        info!(
            "Retrieved {} file(s) into {}",
            report.retrieved,
            self.path.display()
        );
        Ok(TaskOutput::Etl(report))
    }
}
