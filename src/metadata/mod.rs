//! metadata
//!
//! Declarative metadata documents and the algorithms that rewrite them.
//!
//! # Modules
//!
//! - [`entity`] - Registry of entity types (directory, extension, format)
//! - [`document`] - Parsed XML metadata document with keyed-element helpers
//! - [`manifest`] - Packaging manifest (`package.xml`) and member selection
//! - [`transform`] - Entity transform engine and the transform trait
//! - [`layouts`] - Add-related-list transform for page layouts
//! - [`permissions`] - Field/class permission transform for permission sets
//! - [`reconcile`] - Monotonic dependency version reconciliation
//! - [`metaxml`] - `-meta.xml` file walking and API version updates
//!
//! # Error Taxonomy
//!
//! Unknown entity types, opaque entity types and missing member files are
//! configuration errors: they are raised before any document is rewritten.
//! Parse and I/O failures abort the operation; the working copy is
//! disposable, so there is no rollback.

pub mod document;
pub mod entity;
pub mod layouts;
pub mod manifest;
pub mod metaxml;
pub mod permissions;
pub mod reconcile;
pub mod transform;

pub use document::MetadataDocument;
pub use entity::{EntityType, StorageFormat};
pub use manifest::{MemberSelection, PackagingManifest};
pub use transform::{EntityTransform, EntityTransformEngine, TransformOutcome, TransformReport};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// XML namespace of every platform metadata document.
pub const MD_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Errors from metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("unable to locate configuration for entity type '{0}'")]
    UnknownEntity(String),

    #[error("only complete, file-based XML entities can be transformed (not {0})")]
    OpaqueEntity(String),

    #[error("cannot find metadata file {}", .0.display())]
    MissingMember(PathBuf),

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl MetadataError {
    /// Whether the error stems from configuration rather than document content.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            MetadataError::UnknownEntity(_)
                | MetadataError::OpaqueEntity(_)
                | MetadataError::MissingMember(_)
        )
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        MetadataError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Escape text for inclusion in generated XML.
pub fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
