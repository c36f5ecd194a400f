//! metadata::transform
//!
//! Entity transform engine.
//!
//! # Design
//!
//! A transform is a function from one parsed document to an outcome: keep
//! the (possibly rewritten) document, or remove the member from the
//! package. The engine resolves which files a member selection addresses,
//! injects the namespace into each document's raw text, runs the transform
//! and writes the result back in place.
//!
//! All configuration checks happen before the first file is touched:
//! an unknown entity type, an opaque entity type, or a named member
//! without a file aborts the run with nothing rewritten.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::entity::{self, EntityType};
use super::manifest::{MemberSelection, PackagingManifest};
use super::{MetadataDocument, MetadataError};
use crate::core::naming::NamespaceTemplater;

/// Result of transforming one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformOutcome {
    /// Write the document back and keep the member in the package
    Keep,
    /// Drop the member from the package
    Remove,
}

/// A rewrite applied to every selected member of one entity type.
pub trait EntityTransform: Send + Sync {
    /// Entity type name the transform applies to.
    fn entity(&self) -> &str;

    /// Rewrite one document.
    fn transform(
        &self,
        document: &mut MetadataDocument,
        member: &str,
    ) -> Result<TransformOutcome, MetadataError>;
}

/// Members kept and removed by one engine run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformReport {
    pub entity: String,
    pub kept: Vec<String>,
    pub removed: Vec<String>,
}

impl TransformReport {
    /// Deploy manifest for the kept members.
    pub fn manifest(&self) -> PackagingManifest {
        PackagingManifest::single(&self.entity, self.kept.clone())
    }
}

/// Runs an [`EntityTransform`] over a working directory.
pub struct EntityTransformEngine<'a> {
    transform: &'a dyn EntityTransform,
    templater: &'a NamespaceTemplater,
}

impl<'a> EntityTransformEngine<'a> {
    pub fn new(transform: &'a dyn EntityTransform, templater: &'a NamespaceTemplater) -> Self {
        Self {
            transform,
            templater,
        }
    }

    /// Validate that the transform targets a structured entity type.
    pub fn entity_type(&self) -> Result<&'static EntityType, MetadataError> {
        resolve_structured(self.transform.entity())
    }

    /// Transform the selected members under `working_dir`.
    ///
    /// `working_dir` is a package root: members live at
    /// `<working_dir>/<entity dir>/<member>.<ext>`.
    pub fn run(
        &self,
        working_dir: &Path,
        selection: &MemberSelection,
    ) -> Result<TransformReport, MetadataError> {
        let entity = self.entity_type()?;
        let targets = locate(entity, working_dir, selection)?;

        let mut report = TransformReport {
            entity: entity.name.to_string(),
            ..Default::default()
        };

        for (member, path) in targets {
            let raw = fs::read_to_string(&path).map_err(|e| MetadataError::io(&path, e))?;
            let text = self.templater.inject(&raw);
            let mut document =
                MetadataDocument::parse(&text).map_err(|e| MetadataError::Parse {
                    path: path.clone(),
                    message: e.to_string(),
                })?;

            match self.transform.transform(&mut document, &member)? {
                TransformOutcome::Keep => {
                    let xml = document.to_xml_string()?;
                    fs::write(&path, xml).map_err(|e| MetadataError::io(&path, e))?;
                    debug!("Transformed {} {}", entity.name, member);
                    report.kept.push(member);
                }
                TransformOutcome::Remove => {
                    fs::remove_file(&path).map_err(|e| MetadataError::io(&path, e))?;
                    info!("Removed {} {} from the package", entity.name, member);
                    report.removed.push(member);
                }
            }
        }

        Ok(report)
    }
}

/// Look up an entity type that the engine can parse.
pub fn resolve_structured(name: &str) -> Result<&'static EntityType, MetadataError> {
    let entity = entity::lookup(name).ok_or_else(|| MetadataError::UnknownEntity(name.to_string()))?;
    if !entity.is_structured() {
        return Err(MetadataError::OpaqueEntity(name.to_string()));
    }
    Ok(entity)
}

/// Resolve member names to files, failing on the first missing member.
fn locate(
    entity: &EntityType,
    working_dir: &Path,
    selection: &MemberSelection,
) -> Result<Vec<(String, PathBuf)>, MetadataError> {
    let dir = working_dir.join(entity.directory);
    match selection {
        MemberSelection::Named(names) => names
            .iter()
            .map(|member| {
                let path = dir.join(entity.file_name(member));
                if path.is_file() {
                    Ok((member.clone(), path))
                } else {
                    Err(MetadataError::MissingMember(path))
                }
            })
            .collect(),
        MemberSelection::All => {
            if !dir.is_dir() {
                warn!("No {} members found in {}", entity.name, working_dir.display());
                return Ok(Vec::new());
            }
            let manifest = PackagingManifest::discover(working_dir)?;
            Ok(manifest
                .members(entity.name)
                .unwrap_or_default()
                .iter()
                .map(|member| (member.clone(), dir.join(entity.file_name(member))))
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Removes members whose name starts with "Obsolete", tags the rest.
    struct Marker;

    impl EntityTransform for Marker {
        fn entity(&self) -> &str {
            "Layout"
        }

        fn transform(
            &self,
            document: &mut MetadataDocument,
            member: &str,
        ) -> Result<TransformOutcome, MetadataError> {
            if member.starts_with("Obsolete") {
                return Ok(TransformOutcome::Remove);
            }
            let root = document.root();
            document.set_child_text(root, "showEmailCheckbox", "true")?;
            Ok(TransformOutcome::Keep)
        }
    }

    struct Opaque(&'static str);

    impl EntityTransform for Opaque {
        fn entity(&self) -> &str {
            self.0
        }

        fn transform(
            &self,
            _document: &mut MetadataDocument,
            _member: &str,
        ) -> Result<TransformOutcome, MetadataError> {
            Ok(TransformOutcome::Keep)
        }
    }

    const LAYOUT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Layout xmlns=\"http://soap.sforce.com/2006/04/metadata\">\n    <label>%%%NAMESPACE%%%Layout</label>\n</Layout>\n";

    fn package(members: &[&str]) -> TempDir {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("layouts")).unwrap();
        for member in members {
            fs::write(temp.path().join(format!("layouts/{}.layout", member)), LAYOUT).unwrap();
        }
        temp
    }

    #[test]
    fn transforms_named_members_with_injection() {
        let temp = package(&["Account-Account Layout"]);
        let templater = NamespaceTemplater::managed("ns");
        let engine = EntityTransformEngine::new(&Marker, &templater);

        let selection = MemberSelection::Named(vec!["Account-Account Layout".to_string()]);
        let report = engine.run(temp.path(), &selection).unwrap();

        assert_eq!(report.kept, vec!["Account-Account Layout".to_string()]);
        let xml =
            fs::read_to_string(temp.path().join("layouts/Account-Account Layout.layout")).unwrap();
        assert!(xml.contains("<label>ns__Layout</label>"));
        assert!(xml.contains("<showEmailCheckbox>true</showEmailCheckbox>"));
    }

    #[test]
    fn wildcard_expands_and_removes() {
        let temp = package(&["Keep", "ObsoleteOne"]);
        let templater = NamespaceTemplater::unmanaged();
        let engine = EntityTransformEngine::new(&Marker, &templater);

        let report = engine.run(temp.path(), &MemberSelection::All).unwrap();

        assert_eq!(report.kept, vec!["Keep".to_string()]);
        assert_eq!(report.removed, vec!["ObsoleteOne".to_string()]);
        assert!(!temp.path().join("layouts/ObsoleteOne.layout").exists());
        assert_eq!(report.manifest().members("Layout").unwrap(), ["Keep".to_string()]);
        let xml = fs::read_to_string(temp.path().join("layouts/Keep.layout")).unwrap();
        assert!(xml.contains("<label>Layout</label>"));
    }

    #[test]
    fn missing_member_fails_before_rewriting() {
        let temp = package(&["Present"]);
        let templater = NamespaceTemplater::unmanaged();
        let engine = EntityTransformEngine::new(&Marker, &templater);

        let selection =
            MemberSelection::Named(vec!["Present".to_string(), "Absent".to_string()]);
        let err = engine.run(temp.path(), &selection).unwrap_err();

        assert!(matches!(err, MetadataError::MissingMember(_)));
        let untouched = fs::read_to_string(temp.path().join("layouts/Present.layout")).unwrap();
        assert_eq!(untouched, LAYOUT);
    }

    #[test]
    fn unknown_and_opaque_entities_rejected() {
        let temp = TempDir::new().unwrap();
        let templater = NamespaceTemplater::unmanaged();

        let unknown = Opaque("Battlestar");
        let err = EntityTransformEngine::new(&unknown, &templater)
            .run(temp.path(), &MemberSelection::All)
            .unwrap_err();
        assert!(matches!(err, MetadataError::UnknownEntity(_)));

        let bundle = Opaque("LightningComponentBundle");
        let err = EntityTransformEngine::new(&bundle, &templater)
            .run(temp.path(), &MemberSelection::All)
            .unwrap_err();
        assert!(matches!(err, MetadataError::OpaqueEntity(_)));
    }

    #[test]
    fn wildcard_on_missing_directory_is_empty() {
        let temp = TempDir::new().unwrap();
        let templater = NamespaceTemplater::unmanaged();
        let report = EntityTransformEngine::new(&Marker, &templater)
            .run(temp.path(), &MemberSelection::All)
            .unwrap();
        assert!(report.kept.is_empty());
        assert!(report.manifest().is_empty());
    }

    #[test]
    fn parse_failure_names_file() {
        let temp = package(&[]);
        fs::write(temp.path().join("layouts/Broken.layout"), "<Layout").unwrap();
        let templater = NamespaceTemplater::unmanaged();
        let err = EntityTransformEngine::new(&Marker, &templater)
            .run(temp.path(), &MemberSelection::All)
            .unwrap_err();
        assert!(matches!(err, MetadataError::Parse { .. }));
    }
}
