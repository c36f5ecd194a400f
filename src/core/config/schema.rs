//! core::config::schema
//!
//! Configuration schema types.
//!
//! The project file is `metaship.toml` at the project root.
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., the default branch must be a valid branch name,
//! dependency versions must parse).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{BranchName, DependencyVersion, VersionNumber};

/// Project configuration.
///
/// # Example
///
/// ```toml
/// [package]
/// name = "Cumulo"
/// namespace = "cumulo"
/// api_version = "47.0"
///
/// [[package.dependencies]]
/// namespace = "npe01"
/// version = "3.6"
///
/// [git]
/// default_branch = "main"
/// prefix_feature = "feature/"
///
/// [tasks.merge_branch.options]
/// children_only = true
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Package identity and platform API version
    pub package: PackageConfig,

    /// Hosting repository identification
    pub repo: RepoConfig,

    /// Branch conventions
    pub git: GitConfig,

    /// Target org (local transport)
    pub org: OrgConfig,

    /// Per-task option overrides keyed by task name
    pub tasks: BTreeMap<String, TaskConfig>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.package.validate()?;
        self.git.validate()?;
        Ok(())
    }
}

/// Package settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PackageConfig {
    /// Package name
    pub name: Option<String>,

    /// Namespace prefix applied in managed mode
    pub namespace: Option<String>,

    /// Platform API version (e.g., "47.0")
    pub api_version: Option<String>,

    /// Statically resolved dependency versions
    pub dependencies: Vec<DependencyConfig>,
}

impl PackageConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(version) = &self.api_version {
            version.parse::<VersionNumber>().map_err(|_| {
                ConfigError::InvalidValue(format!("invalid api_version '{}'", version))
            })?;
        }
        for dependency in &self.dependencies {
            dependency.resolve()?;
        }
        Ok(())
    }
}

/// A dependency pinned in the project file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DependencyConfig {
    pub namespace: String,
    pub version: String,
}

impl DependencyConfig {
    /// Convert to a resolved dependency version.
    pub fn resolve(&self) -> Result<DependencyVersion, ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::InvalidValue(
                "dependency namespace cannot be empty".to_string(),
            ));
        }
        DependencyVersion::parse(self.namespace.clone(), &self.version).map_err(|e| {
            ConfigError::InvalidValue(format!("dependency '{}': {}", self.namespace, e))
        })
    }
}

/// Hosting repository configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Override owner/org (inferred from the git remote otherwise)
    pub owner: Option<String>,

    /// Override repository name
    pub name: Option<String>,

    /// API base URL (GitHub Enterprise)
    pub api_base: Option<String>,

    /// Git remote used for inference (default: "origin")
    pub remote: Option<String>,
}

/// Branch conventions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GitConfig {
    /// Source branch for cascades
    pub default_branch: Option<String>,

    /// Prefix identifying feature branches
    pub prefix_feature: Option<String>,
}

impl GitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.default_branch {
            BranchName::new(branch.as_str()).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid default_branch: {}", e))
            })?;
        }
        if let Some(prefix) = &self.prefix_feature {
            if prefix.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "prefix_feature cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Target org configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OrgConfig {
    /// Directory backing the local transport, relative to the project root
    pub path: Option<String>,
}

/// Option overrides for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TaskConfig {
    pub options: BTreeMap<String, toml::Value>,
}

impl TaskConfig {
    /// Options rendered as strings, the form task schemas validate.
    pub fn string_options(&self) -> BTreeMap<String, String> {
        self.options
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    toml::Value::String(s) => s.clone(),
                    toml::Value::Array(items) => items
                        .iter()
                        .map(|item| match item {
                            toml::Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .collect::<Vec<_>>()
                        .join(","),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod package_config {
        use super::*;

        #[test]
        fn defaults() {
            let config = PackageConfig::default();
            assert!(config.namespace.is_none());
            assert!(config.dependencies.is_empty());
            assert!(config.validate().is_ok());
        }

        #[test]
        fn invalid_api_version() {
            let config = PackageConfig {
                api_version: Some("latest".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn invalid_dependency_version() {
            let config = PackageConfig {
                dependencies: vec![DependencyConfig {
                    namespace: "npsp".to_string(),
                    version: "beta".to_string(),
                }],
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn dependency_resolves() {
            let dep = DependencyConfig {
                namespace: "npsp".to_string(),
                version: "3.0".to_string(),
            };
            assert_eq!(dep.resolve().unwrap(), DependencyVersion::new("npsp", 3, 0));
        }
    }

    mod git_config {
        use super::*;

        #[test]
        fn invalid_default_branch() {
            let config = GitConfig {
                default_branch: Some("invalid..name".to_string()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }

        #[test]
        fn empty_prefix_rejected() {
            let config = GitConfig {
                prefix_feature: Some(String::new()),
                ..Default::default()
            };
            assert!(config.validate().is_err());
        }
    }

    mod project_config {
        use super::*;

        #[test]
        fn parses_full_file() {
            let toml = r#"
                [package]
                name = "Cumulo"
                namespace = "cumulo"
                api_version = "47.0"

                [[package.dependencies]]
                namespace = "npe01"
                version = "3.6"

                [repo]
                owner = "acme"
                name = "cumulo"

                [git]
                default_branch = "main"
                prefix_feature = "feature/"

                [org]
                path = "org"

                [tasks.merge_branch.options]
                children_only = true
                source_branch = "develop"
            "#;

            let config: ProjectConfig = toml::from_str(toml).unwrap();
            assert!(config.validate().is_ok());
            assert_eq!(config.package.namespace.as_deref(), Some("cumulo"));
            assert_eq!(config.package.dependencies.len(), 1);

            let options = config.tasks["merge_branch"].string_options();
            assert_eq!(options["children_only"], "true");
            assert_eq!(options["source_branch"], "develop");
        }

        #[test]
        fn array_options_join_with_commas() {
            let toml = r#"
                [tasks.add_related_lists.options]
                fields = ["foo__c", "bar__c"]
            "#;
            let config: ProjectConfig = toml::from_str(toml).unwrap();
            let options = config.tasks["add_related_lists"].string_options();
            assert_eq!(options["fields"], "foo__c,bar__c");
        }

        #[test]
        fn reject_unknown_fields() {
            let toml = r#"
                [package]
                name = "x"
                unknown_field = true
            "#;
            let result: Result<ProjectConfig, _> = toml::from_str(toml);
            assert!(result.is_err());
        }

        #[test]
        fn roundtrip() {
            let config = ProjectConfig {
                package: PackageConfig {
                    name: Some("Cumulo".to_string()),
                    namespace: Some("cumulo".to_string()),
                    api_version: Some("47.0".to_string()),
                    dependencies: vec![],
                },
                git: GitConfig {
                    default_branch: Some("main".to_string()),
                    prefix_feature: None,
                },
                ..Default::default()
            };

            let toml = toml::to_string_pretty(&config).unwrap();
            let parsed: ProjectConfig = toml::from_str(&toml).unwrap();
            assert_eq!(config, parsed);
        }
    }
}
