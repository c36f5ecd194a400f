//! metadata::entity
//!
//! Registry of metadata entity types.
//!
//! Every entity type has a conventional directory inside a metadata package
//! and a storage format. Only [`StorageFormat::Document`] entities are single
//! XML files that the transform engine can parse and rewrite.

/// How an entity type is stored on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    /// One XML document per member: `<dir>/<member>.<ext>`
    Document,
    /// One opaque file per member (source code, binary), with a `-meta.xml` companion
    File,
    /// One directory per member holding several files
    Bundle,
}

/// A declared category of metadata document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityType {
    /// Type name as used in `package.xml`
    pub name: &'static str,
    /// Directory inside a package
    pub directory: &'static str,
    /// File extension without the dot (`None` for bundles)
    pub extension: Option<&'static str>,
    pub format: StorageFormat,
}

impl EntityType {
    const fn document(name: &'static str, directory: &'static str, ext: &'static str) -> Self {
        Self {
            name,
            directory,
            extension: Some(ext),
            format: StorageFormat::Document,
        }
    }

    const fn file(name: &'static str, directory: &'static str, ext: &'static str) -> Self {
        Self {
            name,
            directory,
            extension: Some(ext),
            format: StorageFormat::File,
        }
    }

    const fn bundle(name: &'static str, directory: &'static str) -> Self {
        Self {
            name,
            directory,
            extension: None,
            format: StorageFormat::Bundle,
        }
    }

    /// Whether members are complete XML documents.
    pub fn is_structured(&self) -> bool {
        self.format == StorageFormat::Document
    }

    /// File name for a member (bundles use the member as a directory name).
    pub fn file_name(&self, member: &str) -> String {
        match self.extension {
            Some(ext) => format!("{}.{}", member, ext),
            None => member.to_string(),
        }
    }
}

const ENTITY_TYPES: &[EntityType] = &[
    EntityType::file("ApexClass", "classes", "cls"),
    EntityType::file("ApexComponent", "components", "component"),
    EntityType::file("ApexPage", "pages", "page"),
    EntityType::file("ApexTrigger", "triggers", "trigger"),
    EntityType::bundle("AuraDefinitionBundle", "aura"),
    EntityType::document("CustomApplication", "applications", "app"),
    EntityType::document("CustomLabels", "labels", "labels"),
    EntityType::document("CustomObject", "objects", "object"),
    EntityType::document("CustomTab", "tabs", "tab"),
    EntityType::document("FlexiPage", "flexipages", "flexipage"),
    EntityType::document("Flow", "flows", "flow"),
    EntityType::document("InstalledPackage", "installedPackages", "installedPackage"),
    EntityType::document("Layout", "layouts", "layout"),
    EntityType::bundle("LightningComponentBundle", "lwc"),
    EntityType::document("ListView", "listViews", "listView"),
    EntityType::document("PermissionSet", "permissionsets", "permissionset"),
    EntityType::document("Profile", "profiles", "profile"),
    EntityType::document("QuickAction", "quickActions", "quickAction"),
    EntityType::file("StaticResource", "staticresources", "resource"),
    EntityType::document("Workflow", "workflows", "workflow"),
];

/// All registered entity types in registry order.
pub fn all() -> &'static [EntityType] {
    ENTITY_TYPES
}

/// Look up an entity type by name.
///
/// # Example
///
/// ```
/// use metaship::metadata::entity;
///
/// let layout = entity::lookup("Layout").unwrap();
/// assert_eq!(layout.directory, "layouts");
/// assert!(layout.is_structured());
/// assert!(entity::lookup("Battlestar").is_none());
/// ```
pub fn lookup(name: &str) -> Option<&'static EntityType> {
    ENTITY_TYPES.iter().find(|e| e.name == name)
}

/// Look up the entity type stored in a package directory.
pub fn for_directory(directory: &str) -> Option<&'static EntityType> {
    ENTITY_TYPES.iter().find(|e| e.directory == directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_and_directories_are_unique() {
        for (i, a) in ENTITY_TYPES.iter().enumerate() {
            for b in &ENTITY_TYPES[i + 1..] {
                assert_ne!(a.name, b.name);
                assert_ne!(a.directory, b.directory);
            }
        }
    }

    #[test]
    fn bundles_and_files_are_not_structured() {
        assert!(!lookup("LightningComponentBundle").unwrap().is_structured());
        assert!(!lookup("ApexClass").unwrap().is_structured());
        assert!(lookup("CustomApplication").unwrap().is_structured());
    }

    #[test]
    fn file_names() {
        assert_eq!(lookup("CustomApplication").unwrap().file_name("Test"), "Test.app");
        assert_eq!(lookup("AuraDefinitionBundle").unwrap().file_name("cmp"), "cmp");
    }

    #[test]
    fn directory_lookup() {
        assert_eq!(for_directory("layouts").map(|e| e.name), Some("Layout"));
        assert!(for_directory("unknown").is_none());
    }
}
