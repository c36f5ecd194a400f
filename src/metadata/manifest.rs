//! metadata::manifest
//!
//! Packaging manifests (`package.xml`) and member selection.
//!
//! A manifest maps entity type names to member lists. Group order and
//! member order are insertion order; serialization follows them exactly
//! so generated manifests are stable across runs.

use std::fs;
use std::path::Path;

use super::entity::{self, StorageFormat};
use super::{escape_xml, MetadataDocument, MetadataError, MD_NAMESPACE};
use crate::core::naming::NamespaceTemplater;

/// Member name meaning "every member of the type".
pub const WILDCARD: &str = "*";

/// One `<types>` group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestType {
    pub name: String,
    pub members: Vec<String>,
}

/// A packaging manifest.
///
/// A manifest with a full name defines a package: deploying it creates the
/// package and places the deployed members in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagingManifest {
    full_name: Option<String>,
    types: Vec<ManifestType>,
}

impl PackagingManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Manifest with a single group.
    pub fn single<I, S>(entity: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut manifest = Self::new();
        for member in members {
            manifest.add(entity, member);
        }
        manifest
    }

    /// Name the package this manifest defines.
    pub fn with_full_name(mut self, name: impl Into<String>) -> Self {
        self.full_name = Some(name.into());
        self
    }

    pub fn full_name(&self) -> Option<&str> {
        self.full_name.as_deref()
    }

    /// Add a member, creating the group if needed. Duplicates are ignored.
    pub fn add(&mut self, entity: &str, member: impl Into<String>) {
        let member = member.into();
        let group = match self.types.iter().position(|t| t.name == entity) {
            Some(index) => &mut self.types[index],
            None => {
                self.types.push(ManifestType {
                    name: entity.to_string(),
                    members: Vec::new(),
                });
                let last = self.types.len() - 1;
                &mut self.types[last]
            }
        };
        if !group.members.contains(&member) {
            group.members.push(member);
        }
    }

    /// Remove a member; an emptied group is dropped.
    pub fn remove(&mut self, entity: &str, member: &str) {
        if let Some(group) = self.types.iter_mut().find(|t| t.name == entity) {
            group.members.retain(|m| m != member);
        }
        self.types.retain(|t| !t.members.is_empty());
    }

    /// Merge another manifest's groups into this one.
    pub fn extend(&mut self, other: &PackagingManifest) {
        for group in &other.types {
            for member in &group.members {
                self.add(&group.name, member.clone());
            }
        }
    }

    pub fn types(&self) -> &[ManifestType] {
        &self.types
    }

    /// Members of one entity type.
    pub fn members(&self, entity: &str) -> Option<&[String]> {
        self.types
            .iter()
            .find(|t| t.name == entity)
            .map(|t| t.members.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Render `package.xml`.
    ///
    /// # Example
    ///
    /// ```
    /// use metaship::metadata::PackagingManifest;
    ///
    /// let manifest = PackagingManifest::single("ApexClass", ["Foo"]);
    /// let xml = manifest.to_package_xml("47.0");
    /// assert!(xml.contains("        <members>Foo</members>\n        <name>ApexClass</name>\n"));
    /// assert!(xml.ends_with("    <version>47.0</version>\n</Package>\n"));
    /// ```
    pub fn to_package_xml(&self, api_version: &str) -> String {
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!("<Package xmlns=\"{}\">\n", MD_NAMESPACE));
        if let Some(name) = &self.full_name {
            xml.push_str(&format!("    <fullName>{}</fullName>\n", escape_xml(name)));
        }
        for group in &self.types {
            xml.push_str("    <types>\n");
            for member in &group.members {
                xml.push_str(&format!("        <members>{}</members>\n", escape_xml(member)));
            }
            xml.push_str(&format!("        <name>{}</name>\n", escape_xml(&group.name)));
            xml.push_str("    </types>\n");
        }
        xml.push('\n');
        xml.push_str(&format!("    <version>{}</version>\n", escape_xml(api_version)));
        xml.push_str("</Package>\n");
        xml
    }

    /// Read a `package.xml` document.
    ///
    /// Groups without a `name` are rejected; empty groups are dropped.
    pub fn from_package_xml(text: &str) -> Result<Self, MetadataError> {
        let document = MetadataDocument::parse(text)?;
        if !document.root_is("Package") {
            return Err(MetadataError::Xml("document element is not Package".to_string()));
        }
        let mut manifest = Self::new();
        manifest.full_name = document
            .child_text(document.root(), "fullName")
            .filter(|name| !name.is_empty());
        for group in document.child_elements(document.root(), "types") {
            let name = document
                .child_text(group, "name")
                .filter(|n| !n.is_empty())
                .ok_or_else(|| MetadataError::Xml("<types> without <name>".to_string()))?;
            for member in document.child_elements(group, "members") {
                manifest.add(&name, document.text(member).trim());
            }
        }
        Ok(manifest)
    }

    /// Build a manifest describing the contents of a package directory.
    ///
    /// Directories are matched against the entity registry; unknown
    /// directories and `-meta.xml` companions are ignored. Groups follow
    /// registry order and members are sorted.
    pub fn discover(dir: &Path) -> Result<Self, MetadataError> {
        let mut manifest = Self::new();
        for entity in entity::all() {
            let type_dir = dir.join(entity.directory);
            if !type_dir.is_dir() {
                continue;
            }
            let mut members = Vec::new();
            let entries = fs::read_dir(&type_dir).map_err(|e| MetadataError::io(&type_dir, e))?;
            for entry in entries {
                let entry = entry.map_err(|e| MetadataError::io(&type_dir, e))?;
                let path = entry.path();
                let member = match entity.format {
                    StorageFormat::Bundle if path.is_dir() => file_name(&path),
                    StorageFormat::Bundle => None,
                    StorageFormat::Document | StorageFormat::File => {
                        let extension = entity.extension.unwrap_or_default();
                        file_name(&path).and_then(|name| {
                            name.strip_suffix(&format!(".{}", extension))
                                .map(str::to_string)
                        })
                    }
                };
                members.extend(member);
            }
            members.sort();
            for member in members {
                manifest.add(entity.name, member);
            }
        }
        Ok(manifest)
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

/// Which members of an entity type an operation addresses.
///
/// Built from a comma-separated option string. A `*` entry selects every
/// member; the concrete names are resolved against the working directory
/// at transform time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberSelection {
    All,
    Named(Vec<String>),
}

impl MemberSelection {
    /// Parse a comma-separated member list, injecting the namespace token.
    ///
    /// A missing or empty list selects all members.
    pub fn parse(api_names: Option<&str>, templater: &NamespaceTemplater) -> Self {
        let names = api_names
            .map(|list| templater.inject_list(list))
            .unwrap_or_default();
        if names.is_empty() || names.iter().any(|n| n == WILDCARD) {
            MemberSelection::All
        } else {
            MemberSelection::Named(names)
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, MemberSelection::All)
    }

    /// Bind the selection to an entity type as a retrieve manifest.
    pub fn bind(&self, entity: &str) -> PackagingManifest {
        match self {
            MemberSelection::All => PackagingManifest::single(entity, [WILDCARD]),
            MemberSelection::Named(names) => PackagingManifest::single(entity, names.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EXPECTED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="http://soap.sforce.com/2006/04/metadata">
    <types>
        <members>Test</members>
        <name>CustomApplication</name>
    </types>
    <types>
        <members>Account</members>
        <members>Contact</members>
        <name>CustomObject</name>
    </types>

    <version>47.0</version>
</Package>
"#;

    mod package_xml {
        use super::*;

        #[test]
        fn exact_format() {
            let mut manifest = PackagingManifest::new();
            manifest.add("CustomApplication", "Test");
            manifest.add("CustomObject", "Account");
            manifest.add("CustomObject", "Contact");

            assert_eq!(manifest.to_package_xml("47.0"), EXPECTED);
        }

        #[test]
        fn exact_format_objects_then_classes() {
            let mut manifest = PackagingManifest::new();
            manifest.add("CustomObject", "Account");
            manifest.add("CustomObject", "Contact");
            manifest.add("ApexClass", "Test");

            assert_eq!(
                manifest.to_package_xml("47.0"),
                r#"<?xml version="1.0" encoding="UTF-8"?>
<Package xmlns="http://soap.sforce.com/2006/04/metadata">
    <types>
        <members>Account</members>
        <members>Contact</members>
        <name>CustomObject</name>
    </types>
    <types>
        <members>Test</members>
        <name>ApexClass</name>
    </types>

    <version>47.0</version>
</Package>
"#
            );
        }

        #[test]
        fn package_definition() {
            let manifest = PackagingManifest::new().with_full_name("Cumulo");
            let xml = manifest.to_package_xml("47.0");
            assert!(xml.contains(
                "metadata\">\n    <fullName>Cumulo</fullName>\n\n    <version>47.0</version>"
            ));
            assert_eq!(PackagingManifest::from_package_xml(&xml).unwrap(), manifest);
        }

        #[test]
        fn empty_manifest() {
            let xml = PackagingManifest::new().to_package_xml("47.0");
            assert!(xml.contains("<Package xmlns=\"http://soap.sforce.com/2006/04/metadata\">\n\n    <version>47.0</version>"));
            assert!(!xml.contains("<types>"));
        }

        #[test]
        fn members_are_escaped() {
            let xml = PackagingManifest::single("Layout", ["Account-Account Layout & More"])
                .to_package_xml("47.0");
            assert!(xml.contains("<members>Account-Account Layout &amp; More</members>"));
        }
    }

    mod groups {
        use super::*;

        #[test]
        fn duplicates_ignored() {
            let mut manifest = PackagingManifest::new();
            manifest.add("Layout", "A");
            manifest.add("Layout", "A");
            assert_eq!(manifest.members("Layout").unwrap(), ["A".to_string()]);
        }

        #[test]
        fn remove_drops_empty_group() {
            let mut manifest = PackagingManifest::single("Layout", ["A", "B"]);
            manifest.remove("Layout", "A");
            assert_eq!(manifest.members("Layout").unwrap(), ["B".to_string()]);
            manifest.remove("Layout", "B");
            assert!(manifest.is_empty());
        }

        #[test]
        fn extend_merges_groups() {
            let mut manifest = PackagingManifest::single("Layout", ["A"]);
            manifest.extend(&PackagingManifest::single("Layout", ["A", "B"]));
            manifest.extend(&PackagingManifest::single("CustomObject", ["Account"]));
            assert_eq!(manifest.types().len(), 2);
            assert_eq!(manifest.members("Layout").unwrap().len(), 2);
        }
    }

    mod selection {
        use super::*;

        #[test]
        fn missing_list_selects_all() {
            let templater = NamespaceTemplater::unmanaged();
            assert!(MemberSelection::parse(None, &templater).is_wildcard());
            assert!(MemberSelection::parse(Some(" , "), &templater).is_wildcard());
            assert!(MemberSelection::parse(Some("Foo,*"), &templater).is_wildcard());
        }

        #[test]
        fn names_are_injected() {
            let templater = NamespaceTemplater::managed("ns");
            let selection =
                MemberSelection::parse(Some("%%%NAMESPACE%%%Foo__c, Bar__c"), &templater);
            assert_eq!(
                selection,
                MemberSelection::Named(vec!["ns__Foo__c".to_string(), "Bar__c".to_string()])
            );
        }

        #[test]
        fn bind_builds_retrieve_manifest() {
            let manifest = MemberSelection::All.bind("Layout");
            assert_eq!(manifest.members("Layout").unwrap(), ["*".to_string()]);
        }
    }

    mod reading {
        use super::*;

        #[test]
        fn reads_generated_manifest() {
            let xml = PackagingManifest::single("CustomObject", ["Account", "Contact"])
                .to_package_xml("47.0");
            let manifest = PackagingManifest::from_package_xml(&xml).unwrap();
            assert_eq!(
                manifest.members("CustomObject").unwrap(),
                ["Account".to_string(), "Contact".to_string()]
            );
        }

        #[test]
        fn rejects_other_documents() {
            let layout = "<Layout xmlns=\"http://soap.sforce.com/2006/04/metadata\"/>";
            assert!(PackagingManifest::from_package_xml(layout).is_err());
        }

        #[test]
        fn rejects_unnamed_group() {
            let xml = "<Package xmlns=\"http://soap.sforce.com/2006/04/metadata\"><types><members>A</members></types></Package>";
            assert!(PackagingManifest::from_package_xml(xml).is_err());
        }
    }

    #[test]
    fn discover_package_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("classes")).unwrap();
        fs::write(root.join("classes/Foo.cls"), "class Foo {}").unwrap();
        fs::write(root.join("classes/Foo.cls-meta.xml"), "<x/>").unwrap();
        fs::create_dir_all(root.join("lwc/widget")).unwrap();
        fs::create_dir_all(root.join("layouts")).unwrap();
        fs::write(root.join("layouts/B.layout"), "<x/>").unwrap();
        fs::write(root.join("layouts/A.layout"), "<x/>").unwrap();
        fs::create_dir_all(root.join("unknown")).unwrap();

        let manifest = PackagingManifest::discover(root).unwrap();

        assert_eq!(manifest.members("ApexClass").unwrap(), ["Foo".to_string()]);
        assert_eq!(
            manifest.members("Layout").unwrap(),
            ["A".to_string(), "B".to_string()]
        );
        assert_eq!(
            manifest.members("LightningComponentBundle").unwrap(),
            ["widget".to_string()]
        );
        assert_eq!(manifest.types().len(), 3);
    }
}
