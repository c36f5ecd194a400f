//! transport::archive
//!
//! In-memory package archive.
//!
//! Paths are relative and `/`-separated regardless of platform, matching
//! the layout of a zipped metadata package. On the wire an archive travels
//! as a base64-encoded zip.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::TransportError;

/// A package archive: relative path → file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageArchive {
    files: BTreeMap<String, Vec<u8>>,
}

impl PackageArchive {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), contents.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// File contents as UTF-8 text.
    pub fn get_text(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|bytes| std::str::from_utf8(bytes).ok())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Archive every file below `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, TransportError> {
        let mut archive = Self::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                let source = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                TransportError::io(path, source)
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(dir)
                .map_err(|e| TransportError::Archive(e.to_string()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let contents = fs::read(entry.path()).map_err(|e| TransportError::io(entry.path(), e))?;
            archive.insert(key, contents);
        }
        Ok(archive)
    }

    /// Encode as a base64 zip, the form a deploy payload is sent in.
    pub fn to_base64_zip(&self) -> Result<String, TransportError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        for (path, contents) in &self.files {
            writer.start_file(path.as_str(), options).map_err(zip_error)?;
            writer
                .write_all(contents)
                .map_err(|e| TransportError::Archive(e.to_string()))?;
        }
        let zipped = writer.finish().map_err(zip_error)?.into_inner();
        Ok(STANDARD.encode(zipped))
    }

    /// Decode a base64 zip, the form a retrieve result arrives in.
    ///
    /// Directory entries are skipped; entries with absolute or escaping
    /// paths are rejected.
    pub fn from_base64_zip(payload: &str) -> Result<Self, TransportError> {
        let zipped = STANDARD
            .decode(payload.trim())
            .map_err(|e| TransportError::Archive(format!("invalid base64: {}", e)))?;
        let mut zip = ZipArchive::new(Cursor::new(zipped)).map_err(zip_error)?;
        let mut archive = Self::new();
        for index in 0..zip.len() {
            let mut entry = zip.by_index(index).map_err(zip_error)?;
            if entry.is_dir() {
                continue;
            }
            let path = entry.name().to_string();
            validate_entry(&path)?;
            let mut contents = Vec::new();
            entry
                .read_to_end(&mut contents)
                .map_err(|e| TransportError::Archive(format!("{}: {}", path, e)))?;
            archive.insert(path, contents);
        }
        Ok(archive)
    }

    /// Write every file below `dir`, creating directories as needed.
    ///
    /// # Errors
    ///
    /// `TransportError::Archive` for absolute paths or paths escaping `dir`;
    /// nothing is written in that case.
    pub fn extract_all(&self, dir: &Path) -> Result<(), TransportError> {
        for path in self.files.keys() {
            validate_entry(path)?;
        }
        for (path, contents) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| TransportError::io(parent, e))?;
            }
            fs::write(&target, contents).map_err(|e| TransportError::io(&target, e))?;
        }
        Ok(())
    }
}

fn zip_error(e: zip::result::ZipError) -> TransportError {
    TransportError::Archive(e.to_string())
}

fn validate_entry(path: &str) -> Result<(), TransportError> {
    let safe = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if safe {
        Ok(())
    } else {
        Err(TransportError::Archive(format!("unsafe entry path '{}'", path)))
    }
}
