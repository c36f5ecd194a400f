//! transport::local
//!
//! A directory standing in for an org.
//!
//! The directory holds a metadata package layout (`layouts/`, `objects/`,
//! ...). Retrieve copies the members a manifest names out of it; deploy
//! validates an archive and unpacks it in. This is what `metaship task run`
//! uses against `[org] path`, and what integration tests drive end to end.
//!
//! # Deploy validation
//!
//! A deploy is rejected (reported as [`DeployStatus::Failed`], nothing
//! written) when the archive has no `package.xml`, contains files outside
//! known entity directories, or contains a structured document that does not
//! parse. A `destructiveChanges.xml` must be a manifest of known types.
//!
//! # Deploy effects
//!
//! Files are unpacked into the org, then the members listed in
//! `destructiveChanges.xml` are deleted. A `package.xml` with a `fullName`
//! defines a package; its manifest is kept at `packages/<fullName>.xml`.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, info, warn};
use walkdir::WalkDir;

use super::{
    DeployOptions, DeployResult, DeployStatus, MetadataTransport, PackageArchive, RetrieveRequest,
    TransportError,
};
use crate::metadata::entity::{self, EntityType, StorageFormat};
use crate::metadata::manifest::{PackagingManifest, WILDCARD};
use crate::metadata::MetadataDocument;

const PACKAGE_XML: &str = "package.xml";
const DESTRUCTIVE_CHANGES: &str = "destructiveChanges.xml";
const PACKAGES_DIR: &str = "packages";
const META_SUFFIX: &str = "-meta.xml";

/// Directory-backed transport.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    root: PathBuf,
}

impl LocalTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Add one member's files to the archive; returns whether it existed.
    fn collect_member(
        &self,
        entity: &EntityType,
        member: &str,
        archive: &mut PackageArchive,
    ) -> Result<bool, TransportError> {
        let type_dir = self.root.join(entity.directory);
        match entity.format {
            StorageFormat::Bundle => {
                let bundle = type_dir.join(member);
                if !bundle.is_dir() {
                    return Ok(false);
                }
                for entry in WalkDir::new(&bundle).sort_by_file_name() {
                    let entry = entry.map_err(|e| {
                        TransportError::Archive(format!("{}: {}", bundle.display(), e))
                    })?;
                    if entry.file_type().is_file() {
                        self.add_file(entry.path(), archive)?;
                    }
                }
                Ok(true)
            }
            StorageFormat::Document | StorageFormat::File => {
                let file = type_dir.join(entity.file_name(member));
                if !file.is_file() {
                    return Ok(false);
                }
                self.add_file(&file, archive)?;
                let companion = type_dir.join(format!("{}{}", entity.file_name(member), META_SUFFIX));
                if companion.is_file() {
                    self.add_file(&companion, archive)?;
                }
                Ok(true)
            }
        }
    }

    fn add_file(&self, path: &Path, archive: &mut PackageArchive) -> Result<(), TransportError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|e| TransportError::Archive(e.to_string()))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let contents = fs::read(path).map_err(|e| TransportError::io(path, e))?;
        archive.insert(key, contents);
        Ok(())
    }

    /// Delete one member's files; returns whether it existed.
    fn delete_member(&self, entity: &EntityType, member: &str) -> Result<bool, TransportError> {
        let type_dir = self.root.join(entity.directory);
        let target = type_dir.join(entity.file_name(member));
        match entity.format {
            StorageFormat::Bundle => {
                if !target.is_dir() {
                    return Ok(false);
                }
                fs::remove_dir_all(&target).map_err(|e| TransportError::io(&target, e))?;
            }
            StorageFormat::Document | StorageFormat::File => {
                if !target.is_file() {
                    return Ok(false);
                }
                fs::remove_file(&target).map_err(|e| TransportError::io(&target, e))?;
                let companion = type_dir.join(format!("{}{}", entity.file_name(member), META_SUFFIX));
                if companion.is_file() {
                    fs::remove_file(&companion).map_err(|e| TransportError::io(&companion, e))?;
                }
            }
        }
        Ok(true)
    }

    /// Problems that would make the org reject the archive.
    fn validate(archive: &PackageArchive) -> Vec<String> {
        let mut problems = Vec::new();

        match archive.get_text(PACKAGE_XML) {
            None => problems.push("No package.xml found".to_string()),
            Some(text) => {
                if let Err(e) = PackagingManifest::from_package_xml(text) {
                    problems.push(format!("package.xml: {}", e));
                }
            }
        }

        if let Some(text) = archive.get_text(DESTRUCTIVE_CHANGES) {
            match PackagingManifest::from_package_xml(text) {
                Err(e) => problems.push(format!("{}: {}", DESTRUCTIVE_CHANGES, e)),
                Ok(manifest) => {
                    for group in manifest.types() {
                        if entity::lookup(&group.name).is_none() {
                            problems.push(format!(
                                "{}: unknown entity type '{}'",
                                DESTRUCTIVE_CHANGES, group.name
                            ));
                        }
                    }
                }
            }
        }

        for (path, contents) in archive.iter() {
            if path == PACKAGE_XML || path == DESTRUCTIVE_CHANGES {
                continue;
            }
            let directory = path.split('/').next().unwrap_or_default();
            let Some(entity) = entity::for_directory(directory) else {
                problems.push(format!("{}: unknown metadata directory '{}'", path, directory));
                continue;
            };
            let is_document = entity.is_structured()
                && entity
                    .extension
                    .is_some_and(|ext| path.ends_with(&format!(".{}", ext)));
            if is_document {
                let parsed = std::str::from_utf8(contents)
                    .map_err(|e| e.to_string())
                    .and_then(|text| MetadataDocument::parse(text).map_err(|e| e.to_string()));
                if let Err(message) = parsed {
                    problems.push(format!("{}: {}", path, message));
                }
            }
        }

        problems
    }
}

#[async_trait]
impl MetadataTransport for LocalTransport {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn retrieve(&self, request: RetrieveRequest) -> Result<PackageArchive, TransportError> {
        let manifest = PackagingManifest::from_package_xml(&request.package_xml)
            .map_err(|e| TransportError::InvalidManifest(e.to_string()))?;

        let mut archive = PackageArchive::new();
        for group in manifest.types() {
            let entity = entity::lookup(&group.name).ok_or_else(|| {
                TransportError::InvalidManifest(format!("unknown entity type '{}'", group.name))
            })?;

            let members: Vec<String> = if group.members.iter().any(|m| m == WILDCARD) {
                PackagingManifest::discover(&self.root)
                    .map_err(|e| TransportError::Unavailable(e.to_string()))?
                    .members(entity.name)
                    .map(<[String]>::to_vec)
                    .unwrap_or_default()
            } else {
                group.members.clone()
            };

            for member in members {
                if !self.collect_member(entity, &member, &mut archive)? {
                    warn!("Entity of type '{}' named '{}' cannot be found", entity.name, member);
                }
            }
        }
        archive.insert(PACKAGE_XML, request.package_xml.into_bytes());

        info!(
            "Retrieved {} files from {}",
            archive.len() - 1,
            self.root.display()
        );
        Ok(archive)
    }

    async fn deploy(
        &self,
        archive: PackageArchive,
        options: DeployOptions,
    ) -> Result<DeployResult, TransportError> {
        let problems = Self::validate(&archive);
        if !problems.is_empty() {
            for problem in &problems {
                debug!("Deploy problem: {}", problem);
            }
            return Ok(DeployResult::failed(problems));
        }

        let mut files = PackageArchive::new();
        for (path, contents) in archive
            .iter()
            .filter(|(p, _)| *p != PACKAGE_XML && *p != DESTRUCTIVE_CHANGES)
        {
            files.insert(path, contents);
        }
        let destructive = match archive.get_text(DESTRUCTIVE_CHANGES) {
            Some(text) => PackagingManifest::from_package_xml(text)
                .map_err(|e| TransportError::InvalidManifest(e.to_string()))?,
            None => PackagingManifest::new(),
        };
        let deletions: usize = destructive.types().iter().map(|t| t.members.len()).sum();
        let components = files.len() + deletions;

        if options.check_only {
            info!("Validated {} components (check only)", components);
            return Ok(DeployResult::succeeded(components));
        }

        files.extract_all(&self.root)?;

        for group in destructive.types() {
            let Some(entity) = entity::lookup(&group.name) else {
                continue;
            };
            for member in &group.members {
                if self.delete_member(entity, member)? {
                    info!("Deleted {} {}", entity.name, member);
                } else {
                    warn!("Entity of type '{}' named '{}' cannot be found", entity.name, member);
                }
            }
        }

        let package_xml = archive.get_text(PACKAGE_XML).unwrap_or_default();
        let package = PackagingManifest::from_package_xml(package_xml)
            .map_err(|e| TransportError::InvalidManifest(e.to_string()))?;
        if let Some(name) = package.full_name() {
            let dir = self.root.join(PACKAGES_DIR);
            fs::create_dir_all(&dir).map_err(|e| TransportError::io(&dir, e))?;
            let path = dir.join(format!("{}.xml", name));
            fs::write(&path, package_xml).map_err(|e| TransportError::io(&path, e))?;
            info!("Defined package {}", name);
        }

        info!("Deployed {} components to {}", components, self.root.display());
        Ok(DeployResult::succeeded(components))
    }
}
