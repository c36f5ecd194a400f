//! core::naming
//!
//! Namespace injection for metadata component names.
//!
//! Component names and document text may carry the placeholder token
//! [`NAMESPACE_TOKEN`]. In managed mode each occurrence becomes
//! `<namespace>__`; in unmanaged mode the token is deleted.
//!
//! # Example
//!
//! ```
//! use metaship::core::naming::NamespaceTemplater;
//!
//! let managed = NamespaceTemplater::managed("test");
//! assert_eq!(managed.inject("%%%NAMESPACE%%%Test__c"), "test__Test__c");
//!
//! let unmanaged = NamespaceTemplater::unmanaged();
//! assert_eq!(unmanaged.inject("%%%NAMESPACE%%%Test__c"), "Test__c");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};

/// Placeholder token replaced during namespace injection.
pub const NAMESPACE_TOKEN: &str = "%%%NAMESPACE%%%";

/// Rewrites the namespace placeholder token.
#[derive(Debug, Default)]
pub struct NamespaceTemplater {
    namespace: Option<String>,
    unmanaged: bool,
    warned: AtomicBool,
}

impl NamespaceTemplater {
    /// Build a templater for the given mode.
    ///
    /// An empty namespace is treated as no namespace.
    pub fn new(namespace: Option<&str>, unmanaged: bool) -> Self {
        Self {
            namespace: namespace
                .filter(|ns| !ns.is_empty())
                .map(str::to_string),
            unmanaged,
            warned: AtomicBool::new(false),
        }
    }

    /// Managed mode: the token becomes `<namespace>__`.
    pub fn managed(namespace: &str) -> Self {
        Self::new(Some(namespace), false)
    }

    /// Unmanaged mode: the token is removed.
    pub fn unmanaged() -> Self {
        Self::new(None, true)
    }

    pub fn is_unmanaged(&self) -> bool {
        self.unmanaged
    }

    /// The prefix substituted for the token (`""` when unmanaged).
    pub fn prefix(&self) -> String {
        match (&self.namespace, self.unmanaged) {
            (Some(ns), false) => format!("{ns}__"),
            _ => String::new(),
        }
    }

    /// Substitute every occurrence of the placeholder token.
    pub fn inject(&self, text: &str) -> String {
        if !text.contains(NAMESPACE_TOKEN) {
            return text.to_string();
        }
        if !self.unmanaged
            && self.namespace.is_none()
            && !self.warned.swap(true, Ordering::Relaxed)
        {
            log::warn!("No namespace configured for managed mode; removing namespace tokens");
        }
        text.replace(NAMESPACE_TOKEN, &self.prefix())
    }

    /// Inject into each entry of a comma-separated list, trimming entries and
    /// dropping empty ones.
    pub fn inject_list(&self, list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| self.inject(s))
            .collect()
    }
}
