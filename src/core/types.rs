//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`BranchName`] - Validated branch name with cascade decomposition
//! - [`VersionNumber`] - `(major, minor)` pair with lexicographic ordering
//! - [`DependencyVersion`] - A resolved package version for one namespace
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use metaship::core::types::{BranchName, VersionNumber};
//!
//! let branch = BranchName::new("feature/login__api").unwrap();
//! assert_eq!(branch.split_child(), Some(("feature/login", "api")));
//!
//! let v: VersionNumber = "1.2 (Beta 3)".parse().unwrap();
//! assert_eq!(v, VersionNumber::new(1, 2));
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Separator between a parent branch name and a child suffix.
pub const CHILD_SEPARATOR: &str = "__";

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid version number: {0}")]
    InvalidVersion(String),
}

/// A validated branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use metaship::core::types::BranchName;
///
/// let name = BranchName::new("feature/my-branch").unwrap();
/// assert_eq!(name.as_str(), "feature/my-branch");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// assert!(BranchName::new("@").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let invalid = |reason: &str| -> Result<(), TypeError> {
            Err(TypeError::InvalidBranchName(reason.to_string()))
        };

        if name.is_empty() {
            return invalid("branch name cannot be empty");
        }
        if name == "@" {
            return invalid("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return invalid("branch name cannot start with '.' or '-'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return invalid("branch name cannot end with '.lock' or '/'");
        }
        for sequence in ["..", "@{", "//"] {
            if name.contains(sequence) {
                return Err(TypeError::InvalidBranchName(format!(
                    "branch name cannot contain '{sequence}'"
                )));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if let Some(c) = name
            .chars()
            .find(|c| INVALID_CHARS.contains(c) || c.is_ascii_control())
        {
            return Err(TypeError::InvalidBranchName(format!(
                "branch name cannot contain {c:?}"
            )));
        }

        for component in name.split('/') {
            if component.starts_with('.') || component.ends_with(".lock") {
                return invalid("path component cannot start with '.' or end with '.lock'");
            }
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Split a child branch into `(parent, suffix)` on the last `__`.
    ///
    /// Returns `None` for branches that carry no child suffix.
    pub fn split_child(&self) -> Option<(&str, &str)> {
        self.0
            .rsplit_once(CHILD_SEPARATOR)
            .filter(|(parent, suffix)| !parent.is_empty() && !suffix.is_empty())
    }

    /// The name a direct child of this branch would start with.
    pub fn child_prefix(&self) -> String {
        format!("{}{}", self.0, CHILD_SEPARATOR)
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A package version reduced to `(major, minor)`.
///
/// Ordering is lexicographic: major first, then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct VersionNumber {
    pub major: u32,
    pub minor: u32,
}

impl VersionNumber {
    pub fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl FromStr for VersionNumber {
    type Err = TypeError;

    /// Parse `major[.minor[.patch...]]`, ignoring any trailing text such as
    /// `" (Beta 3)"`. Components past the minor number are dropped.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let numeric = s.split_whitespace().next().unwrap_or("");
        let mut parts = numeric.split('.');

        let parse = |part: Option<&str>| -> Result<Option<u32>, TypeError> {
            match part {
                None => Ok(None),
                Some(p) => p
                    .parse::<u32>()
                    .map(Some)
                    .map_err(|_| TypeError::InvalidVersion(s.to_string())),
            }
        };

        let major = parse(parts.next())?.ok_or_else(|| TypeError::InvalidVersion(s.to_string()))?;
        let minor = parse(parts.next())?.unwrap_or(0);
        Ok(Self::new(major, minor))
    }
}

impl std::fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A resolved dependency: the authoritative version for one namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyVersion {
    pub namespace: String,
    pub version: VersionNumber,
}

impl DependencyVersion {
    pub fn new(namespace: impl Into<String>, major: u32, minor: u32) -> Self {
        Self {
            namespace: namespace.into(),
            version: VersionNumber::new(major, minor),
        }
    }

    /// Build from a namespace and a version string such as `"3.0"`.
    pub fn parse(namespace: impl Into<String>, version: &str) -> Result<Self, TypeError> {
        Ok(Self {
            namespace: namespace.into(),
            version: version.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod branch_name {
        use super::*;

        #[test]
        fn valid_names() {
            for name in ["main", "feature/a-test", "feature/a-test__child", "user@feature"] {
                assert!(BranchName::new(name).is_ok(), "{name} should be valid");
            }
        }

        #[test]
        fn invalid_names() {
            for name in [
                "",
                "@",
                ".hidden",
                "-dash",
                "branch.lock",
                "trailing/",
                "a..b",
                "a@{b",
                "a//b",
                "has space",
                "tilde~",
                "feature/.hidden",
            ] {
                assert!(BranchName::new(name).is_err(), "{name} should be invalid");
            }
        }

        #[test]
        fn split_child_uses_last_separator() {
            let name = BranchName::new("feature/a__b__c").unwrap();
            assert_eq!(name.split_child(), Some(("feature/a__b", "c")));
        }

        #[test]
        fn split_child_none_without_suffix() {
            assert_eq!(BranchName::new("feature/a").unwrap().split_child(), None);
            assert_eq!(BranchName::new("feature/a__").unwrap().split_child(), None);
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<BranchName, _> = serde_json::from_str("\"a..b\"");
            assert!(result.is_err());
        }
    }

    mod version_number {
        use super::*;

        #[test]
        fn parses_major_minor() {
            assert_eq!("3.0".parse::<VersionNumber>().unwrap(), VersionNumber::new(3, 0));
            assert_eq!("1.12".parse::<VersionNumber>().unwrap(), VersionNumber::new(1, 12));
        }

        #[test]
        fn parses_major_only_and_patch() {
            assert_eq!("4".parse::<VersionNumber>().unwrap(), VersionNumber::new(4, 0));
            assert_eq!("2.3.9".parse::<VersionNumber>().unwrap(), VersionNumber::new(2, 3));
        }

        #[test]
        fn ignores_beta_suffix() {
            assert_eq!(
                "1.2 (Beta 3)".parse::<VersionNumber>().unwrap(),
                VersionNumber::new(1, 2)
            );
        }

        #[test]
        fn rejects_garbage() {
            assert!("".parse::<VersionNumber>().is_err());
            assert!("x.1".parse::<VersionNumber>().is_err());
        }

        #[test]
        fn ordering_is_major_first() {
            assert!(VersionNumber::new(2, 0) > VersionNumber::new(1, 99));
            assert!(VersionNumber::new(1, 1) > VersionNumber::new(1, 0));
            assert_eq!(VersionNumber::new(1, 1).to_string(), "1.1");
        }
    }
}
