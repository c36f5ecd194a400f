//! metadata::metaxml
//!
//! Source-tree rewrites over `-meta.xml` companion files.
//!
//! Both the dependency reconciler and the API version updater walk a source
//! tree, parse every `*-meta.xml` file, apply an in-place edit and write back
//! only the files whose content changed.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use super::{MetadataDocument, MetadataError};

const META_SUFFIX: &str = "-meta.xml";

/// Changes applied to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: PathBuf,
    pub changes: usize,
}

/// All `*-meta.xml` files under `dir`, sorted by path.
pub fn meta_xml_files(dir: &Path) -> Result<Vec<PathBuf>, MetadataError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            MetadataError::Io { path, source }
        })?;
        let is_meta = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(META_SUFFIX));
        if entry.file_type().is_file() && is_meta {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Apply `edit` to every `-meta.xml` file under `dir`.
///
/// `edit` returns the number of changes it made; files with zero changes are
/// not rewritten.
pub fn rewrite_meta_files<F>(dir: &Path, mut edit: F) -> Result<Vec<FileUpdate>, MetadataError>
where
    F: FnMut(&mut MetadataDocument, &Path) -> Result<usize, MetadataError>,
{
    let mut updates = Vec::new();
    for path in meta_xml_files(dir)? {
        let text = fs::read_to_string(&path).map_err(|e| MetadataError::io(&path, e))?;
        let mut document = MetadataDocument::parse(&text).map_err(|e| MetadataError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let changes = edit(&mut document, &path)?;
        if changes == 0 {
            continue;
        }

        let xml = document.to_xml_string()?;
        fs::write(&path, xml).map_err(|e| MetadataError::io(&path, e))?;
        debug!("Rewrote {} ({} changes)", path.display(), changes);
        updates.push(FileUpdate { path, changes });
    }
    Ok(updates)
}

/// Sets the top-level `apiVersion` of metadata companion files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionUpdater {
    version: String,
}

impl ApiVersionUpdater {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }

    /// Update one document; returns the number of elements changed.
    pub fn update(&self, document: &mut MetadataDocument) -> Result<usize, MetadataError> {
        let root = document.root();
        let mut changes = 0;
        for node in document.child_elements(root, "apiVersion") {
            if document.text(node).trim() != self.version {
                document.set_text(node, &self.version)?;
                changes += 1;
            }
        }
        Ok(changes)
    }

    /// Update every `-meta.xml` file under `dir`.
    pub fn update_dir(&self, dir: &Path) -> Result<Vec<FileUpdate>, MetadataError> {
        let updates = rewrite_meta_files(dir, |document, _| self.update(document))?;
        info!(
            "Set apiVersion {} in {} files under {}",
            self.version,
            updates.len(),
            dir.display()
        );
        Ok(updates)
    }
}
