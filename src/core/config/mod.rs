//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! A project is the directory holding `metaship.toml`. The file is searched
//! for starting at the working directory and walking up to the filesystem
//! root. A missing file is not an error: defaults are used and a warning is
//! reported.
//!
//! # Precedence
//!
//! For task options (later overrides earlier):
//! 1. Schema defaults
//! 2. `[tasks.<name>.options]` in the project file
//! 3. CLI `-o name=value` flags (not handled here)
//!
//! # Example
//!
//! ```no_run
//! use metaship::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Path::new("/path/to/project")).unwrap();
//! let config = result.config;
//!
//! println!("API version: {}", config.api_version());
//! println!("Source branch: {}", config.default_branch());
//! ```

pub mod schema;

pub use schema::{
    DependencyConfig, GitConfig, OrgConfig, PackageConfig, ProjectConfig, RepoConfig, TaskConfig,
};

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::types::DependencyVersion;

/// Project configuration file name.
pub const CONFIG_FILE_NAME: &str = "metaship.toml";

/// API version used when the project does not configure one.
pub const DEFAULT_API_VERSION: &str = "47.0";

/// Errors from configuration operations.
///
/// Task option errors live here too: an unknown task or option is a
/// configuration error raised before any task runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task '{task}' does not accept option '{option}'")]
    UnknownOption { task: String, option: String },

    #[error("task '{task}' requires option '{option}'")]
    MissingOption { task: String, option: String },

    #[error("invalid value for option '{option}' of task '{task}': {message}")]
    InvalidOption {
        task: String,
        option: String,
        message: String,
    },
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Loaded project configuration with accessor defaults applied.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed project file (defaults if none was found)
    pub project: ProjectConfig,
    /// Directory treated as the project root
    root: PathBuf,
    /// Path to the project file (if loaded)
    path: Option<PathBuf>,
}

impl Config {
    /// Load configuration for the project containing `start`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be read, parsed,
    /// or validated. A missing config file is not an error.
    pub fn load(start: &Path) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let found = start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE_NAME))
            .find(|candidate| candidate.is_file());

        let config = match found {
            Some(path) => {
                let project = Self::read_project_config(&path)?;
                project.validate()?;
                let root = path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| start.to_path_buf());
                Config {
                    project,
                    root,
                    path: Some(path),
                }
            }
            None => {
                warnings.push(ConfigWarning {
                    message: format!("no {} found; using defaults", CONFIG_FILE_NAME),
                    path: start.to_path_buf(),
                });
                Config::with_project(start, ProjectConfig::default())
            }
        };

        Ok(ConfigLoadResult { config, warnings })
    }

    /// Build a configuration from an in-memory project definition.
    pub fn with_project(root: impl Into<PathBuf>, project: ProjectConfig) -> Self {
        Self {
            project,
            root: root.into(),
            path: None,
        }
    }

    fn read_project_config(path: &Path) -> Result<ProjectConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the loaded project file, if any.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Platform API version.
    ///
    /// Defaults to [`DEFAULT_API_VERSION`].
    pub fn api_version(&self) -> &str {
        self.project
            .package
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_API_VERSION)
    }

    /// Package name, if configured.
    pub fn package_name(&self) -> Option<&str> {
        self.project.package.name.as_deref()
    }

    /// Package namespace, if configured.
    pub fn namespace(&self) -> Option<&str> {
        self.project.package.namespace.as_deref()
    }

    /// Cascade source branch.
    ///
    /// Defaults to "main".
    pub fn default_branch(&self) -> &str {
        self.project
            .git
            .default_branch
            .as_deref()
            .unwrap_or("main")
    }

    /// Feature branch prefix.
    ///
    /// Defaults to "feature/".
    pub fn prefix_feature(&self) -> &str {
        self.project
            .git
            .prefix_feature
            .as_deref()
            .unwrap_or("feature/")
    }

    /// Git remote used to infer the hosting repository.
    ///
    /// Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.project.repo.remote.as_deref().unwrap_or("origin")
    }

    /// Directory backing the local transport.
    ///
    /// Defaults to `<root>/org`.
    pub fn org_path(&self) -> PathBuf {
        self.root
            .join(self.project.org.path.as_deref().unwrap_or("org"))
    }

    /// Statically resolved dependency versions.
    pub fn dependencies(&self) -> Result<Vec<DependencyVersion>, ConfigError> {
        self.project
            .package
            .dependencies
            .iter()
            .map(DependencyConfig::resolve)
            .collect()
    }

    /// Option overrides configured for a task.
    pub fn task_options(&self, task: &str) -> BTreeMap<String, String> {
        self.project
            .tasks
            .get(task)
            .map(|t| t.string_options())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_without_file_uses_defaults() {
        let temp = TempDir::new().unwrap();

        let result = Config::load(temp.path()).unwrap();
        let config = result.config;

        assert_eq!(config.api_version(), DEFAULT_API_VERSION);
        assert_eq!(config.default_branch(), "main");
        assert_eq!(config.prefix_feature(), "feature/");
        assert_eq!(config.remote(), "origin");
        assert!(config.namespace().is_none());
        assert_eq!(config.org_path(), temp.path().join("org"));
        assert_eq!(result.warnings.len(), 1);
    }

    #[test]
    fn load_project_file() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            r#"
            [package]
            namespace = "cumulo"
            api_version = "48.0"

            [[package.dependencies]]
            namespace = "npsp"
            version = "3.0"

            [git]
            default_branch = "master"
            "#,
        )
        .unwrap();

        let result = Config::load(temp.path()).unwrap();
        let config = result.config;

        assert!(result.warnings.is_empty());
        assert_eq!(config.api_version(), "48.0");
        assert_eq!(config.namespace(), Some("cumulo"));
        assert_eq!(config.default_branch(), "master");
        assert_eq!(
            config.dependencies().unwrap(),
            vec![DependencyVersion::new("npsp", 3, 0)]
        );
        assert_eq!(config.loaded_from(), Some(temp.path().join(CONFIG_FILE_NAME).as_path()));
    }

    #[test]
    fn load_searches_parent_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[org]\npath = \"target-org\"\n").unwrap();
        let nested = temp.path().join("src/layouts");
        fs::create_dir_all(&nested).unwrap();

        let config = Config::load(&nested).unwrap().config;

        assert_eq!(config.root(), temp.path());
        assert_eq!(config.org_path(), temp.path().join("target-org"));
    }

    #[test]
    fn invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(CONFIG_FILE_NAME),
            "[git]\ndefault_branch = \"invalid..name\"\n",
        )
        .unwrap();

        let result = Config::load(temp.path());
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn unparseable_file_rejected() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(CONFIG_FILE_NAME), "[package\n").unwrap();

        let result = Config::load(temp.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn task_options_default_to_empty() {
        let config = Config::with_project("/tmp", ProjectConfig::default());
        assert!(config.task_options("merge_branch").is_empty());
    }
}
