//! metadata::reconcile
//!
//! Dependency version reconciliation.
//!
//! Metadata companion files pin the versions of installed packages they
//! reference:
//!
//! ```xml
//! <packageVersions>
//!     <namespace>npsp</namespace>
//!     <majorNumber>3</majorNumber>
//!     <minorNumber>0</minorNumber>
//! </packageVersions>
//! ```
//!
//! The reconciler raises those pins to the resolved dependency versions.
//!
//! # Invariants
//!
//! - A pin is only ever raised, compared by `(major, minor)`
//! - Namespaces without a resolved version are untouched
//! - Resolved namespaces missing from a document are never inserted
//! - Reconciling twice changes nothing the second time

use std::collections::HashMap;
use std::path::Path;

use log::{debug, info};
use xot::Node;

use super::metaxml::{rewrite_meta_files, FileUpdate};
use super::{MetadataDocument, MetadataError};
use crate::core::types::{DependencyVersion, VersionNumber};

/// One raised version pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionUpdate {
    pub namespace: String,
    pub from: VersionNumber,
    pub to: VersionNumber,
}

/// Raises `packageVersions` pins to resolved dependency versions.
#[derive(Debug, Clone, Default)]
pub struct DependencyVersionReconciler {
    resolved: HashMap<String, VersionNumber>,
}

impl DependencyVersionReconciler {
    /// Build from a resolved dependency set.
    ///
    /// When a namespace appears more than once the highest version wins.
    pub fn new(dependencies: impl IntoIterator<Item = DependencyVersion>) -> Self {
        let mut resolved: HashMap<String, VersionNumber> = HashMap::new();
        for dependency in dependencies {
            resolved
                .entry(dependency.namespace)
                .and_modify(|current| {
                    if dependency.version > *current {
                        *current = dependency.version;
                    }
                })
                .or_insert(dependency.version);
        }
        Self { resolved }
    }

    /// Resolved version for a namespace.
    pub fn resolved(&self, namespace: &str) -> Option<VersionNumber> {
        self.resolved.get(namespace).copied()
    }

    /// Reconcile one parsed document in place.
    pub fn reconcile(
        &self,
        document: &mut MetadataDocument,
    ) -> Result<Vec<VersionUpdate>, MetadataError> {
        let mut updates = Vec::new();
        for element in document.elements_named("packageVersions") {
            if let Some(update) = self.reconcile_element(document, element)? {
                updates.push(update);
            }
        }
        Ok(updates)
    }

    fn reconcile_element(
        &self,
        document: &mut MetadataDocument,
        element: Node,
    ) -> Result<Option<VersionUpdate>, MetadataError> {
        let Some(namespace) = document.child_text(element, "namespace") else {
            return Ok(None);
        };
        let Some(target) = self.resolved(&namespace) else {
            return Ok(None);
        };

        let major = document
            .child_text(element, "majorNumber")
            .and_then(|text| text.parse::<u32>().ok());
        let Some(major) = major else {
            debug!("Skipping packageVersions for {}: no majorNumber", namespace);
            return Ok(None);
        };
        let minor = document
            .child_text(element, "minorNumber")
            .and_then(|text| text.parse::<u32>().ok())
            .unwrap_or(0);
        let current = VersionNumber::new(major, minor);

        if target <= current {
            return Ok(None);
        }

        document.set_child_text(element, "majorNumber", &target.major.to_string())?;
        document.set_child_text(element, "minorNumber", &target.minor.to_string())?;
        Ok(Some(VersionUpdate {
            namespace,
            from: current,
            to: target,
        }))
    }

    /// Reconcile document text; returns `None` when nothing changed.
    pub fn reconcile_text(&self, text: &str) -> Result<Option<String>, MetadataError> {
        let mut document = MetadataDocument::parse(text)?;
        if self.reconcile(&mut document)?.is_empty() {
            return Ok(None);
        }
        document.to_xml_string().map(Some)
    }

    /// Reconcile every `-meta.xml` file under `dir`.
    ///
    /// Only changed files are rewritten.
    pub fn reconcile_dir(&self, dir: &Path) -> Result<Vec<FileUpdate>, MetadataError> {
        let updates = rewrite_meta_files(dir, |document, path| {
            let updates = self.reconcile(document)?;
            for update in &updates {
                info!(
                    "{}: {} {} -> {}",
                    path.display(),
                    update.namespace,
                    update.from,
                    update.to
                );
            }
            Ok(updates.len())
        })?;
        info!(
            "Updated dependency versions in {} files under {}",
            updates.len(),
            dir.display()
        );
        Ok(updates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const CLASS_META: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ApexClass xmlns="http://soap.sforce.com/2006/04/metadata">
    <apiVersion>42.0</apiVersion>
    <packageVersions>
        <namespace>npsp</namespace>
        <majorNumber>1</majorNumber>
        <minorNumber>0</minorNumber>
    </packageVersions>
    <packageVersions>
        <namespace>npe01</namespace>
        <majorNumber>1</majorNumber>
        <minorNumber>0</minorNumber>
    </packageVersions>
    <packageVersions>
        <namespace>other</namespace>
        <majorNumber>9</majorNumber>
        <minorNumber>9</minorNumber>
    </packageVersions>
    <status>Active</status>
</ApexClass>
"#;

    fn reconciler() -> DependencyVersionReconciler {
        DependencyVersionReconciler::new([
            DependencyVersion::new("npsp", 3, 0),
            DependencyVersion::new("npe01", 1, 1),
            DependencyVersion::new("unused", 2, 0),
        ])
    }

    fn pin(xml: &str, namespace: &str) -> String {
        let start = xml
            .find(&format!("<namespace>{}</namespace>", namespace))
            .unwrap();
        let end = start + xml[start..].find("</packageVersions>").unwrap();
        xml[start..end].to_string()
    }

    #[test]
    fn raises_pins_to_resolved_versions() {
        let xml = reconciler().reconcile_text(CLASS_META).unwrap().unwrap();

        let npsp = pin(&xml, "npsp");
        assert!(npsp.contains("<majorNumber>3</majorNumber>"));
        assert!(npsp.contains("<minorNumber>0</minorNumber>"));
        let npe01 = pin(&xml, "npe01");
        assert!(npe01.contains("<majorNumber>1</majorNumber>"));
        assert!(npe01.contains("<minorNumber>1</minorNumber>"));
        let other = pin(&xml, "other");
        assert!(other.contains("<majorNumber>9</majorNumber>"));
        assert!(!xml.contains("unused"));
    }

    #[test]
    fn never_downgrades() {
        for (major, minor) in [(8, 10), (9, 1), (9, 9)] {
            let reconciler =
                DependencyVersionReconciler::new([DependencyVersion::new("other", major, minor)]);
            assert!(reconciler.reconcile_text(CLASS_META).unwrap().is_none());
        }
    }

    #[test]
    fn idempotent() {
        let reconciler = reconciler();
        let once = reconciler.reconcile_text(CLASS_META).unwrap().unwrap();
        assert!(reconciler.reconcile_text(&once).unwrap().is_none());
    }

    #[test]
    fn reports_updates() {
        let mut document = MetadataDocument::parse(CLASS_META).unwrap();
        let updates = reconciler().reconcile(&mut document).unwrap();
        assert_eq!(
            updates,
            vec![
                VersionUpdate {
                    namespace: "npsp".to_string(),
                    from: VersionNumber::new(1, 0),
                    to: VersionNumber::new(3, 0),
                },
                VersionUpdate {
                    namespace: "npe01".to_string(),
                    from: VersionNumber::new(1, 0),
                    to: VersionNumber::new(1, 1),
                },
            ]
        );
    }

    #[test]
    fn missing_minor_number_is_added() {
        let text = r#"<ApexPage xmlns="http://soap.sforce.com/2006/04/metadata">
    <packageVersions>
        <namespace>npsp</namespace>
        <majorNumber>2</majorNumber>
    </packageVersions>
</ApexPage>"#;
        let xml = reconciler().reconcile_text(text).unwrap().unwrap();
        assert!(xml.contains("<majorNumber>3</majorNumber>"));
        assert!(xml.contains("<minorNumber>0</minorNumber>"));
    }

    #[test]
    fn duplicate_dependencies_keep_highest() {
        let reconciler = DependencyVersionReconciler::new([
            DependencyVersion::new("npsp", 3, 2),
            DependencyVersion::new("npsp", 3, 1),
        ]);
        assert_eq!(reconciler.resolved("npsp"), Some(VersionNumber::new(3, 2)));
    }

    #[test]
    fn reconcile_dir_rewrites_changed_files_only() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("classes")).unwrap();
        fs::write(temp.path().join("classes/A.cls-meta.xml"), CLASS_META).unwrap();
        let untouched = r#"<?xml version="1.0" encoding="UTF-8"?>
<ApexClass xmlns="http://soap.sforce.com/2006/04/metadata">
    <apiVersion>42.0</apiVersion>
</ApexClass>
"#;
        fs::write(temp.path().join("classes/B.cls-meta.xml"), untouched).unwrap();

        let updates = reconciler().reconcile_dir(temp.path()).unwrap();

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].changes, 2);
        assert!(updates[0].path.ends_with("classes/A.cls-meta.xml"));
        assert_eq!(
            fs::read_to_string(temp.path().join("classes/B.cls-meta.xml")).unwrap(),
            untouched
        );
    }
}
