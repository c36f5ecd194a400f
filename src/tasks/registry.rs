//! tasks::registry
//!
//! The built-in task table.
//!
//! Keys are stable strings. A task's schema is data, so `task info` can
//! describe it and option resolution can validate against it without
//! building the task.

use std::collections::BTreeMap;

use log::debug;

use super::options::{OptionSpec, TaskOptions};
use super::{merge, metadata, source, Task, TaskError};
use crate::core::config::{Config, ConfigError};

/// Which collaborator a task needs at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskNeeds {
    /// A forge (repository host)
    Forge,
    /// A metadata transport (org)
    Transport,
    /// Only the local filesystem
    Filesystem,
}

type Builder = fn(&TaskOptions, &Config) -> Result<Box<dyn Task>, TaskError>;

/// A registered task.
#[derive(Clone, Copy)]
pub struct TaskSpec {
    pub key: &'static str,
    pub description: &'static str,
    pub options: &'static [OptionSpec],
    pub needs: TaskNeeds,
    build: Builder,
}

impl std::fmt::Debug for TaskSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskSpec")
            .field("key", &self.key)
            .field("needs", &self.needs)
            .finish_non_exhaustive()
    }
}

/// Lookup table of tasks by key.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    specs: Vec<TaskSpec>,
}

impl TaskRegistry {
    /// The tasks shipped with metaship.
    pub fn builtin() -> Self {
        Self {
            specs: vec![
                TaskSpec {
                    key: "merge_branch",
                    description: "Merge the source branch into every feature branch and their children",
                    options: merge::MERGE_BRANCH_OPTIONS,
                    needs: TaskNeeds::Forge,
                    build: merge::build_merge_branch,
                },
                TaskSpec {
                    key: "add_related_lists",
                    description: "Add a related list to page layouts",
                    options: metadata::ADD_RELATED_LISTS_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_add_related_lists,
                },
                TaskSpec {
                    key: "add_permission_set_perms",
                    description: "Grant field and Apex class access in permission sets",
                    options: metadata::ADD_PERMISSION_SET_PERMS_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_add_permission_set_perms,
                },
                TaskSpec {
                    key: "update_dependencies",
                    description: "Raise package version references in -meta.xml files to the project's dependencies",
                    options: source::UPDATE_DEPENDENCIES_OPTIONS,
                    needs: TaskNeeds::Filesystem,
                    build: source::build_update_dependencies,
                },
                TaskSpec {
                    key: "update_api_version",
                    description: "Set the apiVersion of every -meta.xml file",
                    options: source::UPDATE_API_VERSION_OPTIONS,
                    needs: TaskNeeds::Filesystem,
                    build: source::build_update_api_version,
                },
                TaskSpec {
                    key: "install_package_version",
                    description: "Install a managed package version",
                    options: metadata::INSTALL_PACKAGE_VERSION_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_install_package_version,
                },
                TaskSpec {
                    key: "uninstall_package",
                    description: "Uninstall a managed package",
                    options: metadata::UNINSTALL_PACKAGE_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_uninstall_package,
                },
                TaskSpec {
                    key: "create_package",
                    description: "Create the project's package in the org",
                    options: metadata::CREATE_PACKAGE_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_create_package,
                },
                TaskSpec {
                    key: "deploy",
                    description: "Deploy a metadata source directory",
                    options: metadata::DEPLOY_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_deploy,
                },
                TaskSpec {
                    key: "deploy_bundles",
                    description: "Deploy each metadata bundle directory under a path",
                    options: metadata::DEPLOY_BUNDLES_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_deploy_bundles,
                },
                TaskSpec {
                    key: "retrieve_unpackaged",
                    description: "Retrieve the metadata named by a package.xml",
                    options: metadata::RETRIEVE_UNPACKAGED_OPTIONS,
                    needs: TaskNeeds::Transport,
                    build: metadata::build_retrieve_unpackaged,
                },
            ],
        }
    }

    /// Look up a task by key.
    pub fn get(&self, key: &str) -> Result<&TaskSpec, ConfigError> {
        self.specs
            .iter()
            .find(|spec| spec.key == key)
            .ok_or_else(|| ConfigError::UnknownTask(key.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskSpec> {
        self.specs.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.specs.iter().map(|spec| spec.key)
    }

    /// Resolve options for `key` and build the task.
    ///
    /// Configured options come from `[tasks.<key>.options]`; `cli` overrides
    /// them.
    pub fn build(
        &self,
        key: &str,
        config: &Config,
        cli: &BTreeMap<String, String>,
    ) -> Result<Box<dyn Task>, TaskError> {
        let spec = self.get(key)?;
        let options = TaskOptions::resolve(key, spec.options, &config.task_options(key), cli)?;
        debug!("Building task {} with options {:?}", key, options);
        (spec.build)(&options, config)
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{ProjectConfig, TaskConfig};

    fn cli(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn builtin_keys_are_unique_and_stable() {
        let registry = TaskRegistry::builtin();
        let keys: Vec<&str> = registry.keys().collect();
        assert_eq!(
            keys,
            vec![
                "merge_branch",
                "add_related_lists",
                "add_permission_set_perms",
                "update_dependencies",
                "update_api_version",
                "install_package_version",
                "uninstall_package",
                "create_package",
                "deploy",
                "deploy_bundles",
                "retrieve_unpackaged",
            ]
        );
    }

    #[test]
    fn option_names_are_unique_per_task() {
        for spec in TaskRegistry::builtin().iter() {
            let mut names: Vec<&str> = spec.options.iter().map(|o| o.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), spec.options.len(), "{}", spec.key);
        }
    }

    #[test]
    fn unknown_task() {
        let registry = TaskRegistry::builtin();
        let err = registry
            .build("launch_rockets", &Config::default(), &cli(&[]))
            .err()
            .unwrap();
        assert!(matches!(err, TaskError::Config(ConfigError::UnknownTask(_))));
    }

    #[test]
    fn unknown_option_rejected_before_build() {
        let registry = TaskRegistry::builtin();
        let err = registry
            .build("merge_branch", &Config::default(), &cli(&[("colour", "blue")]))
            .err()
            .unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn configured_options_feed_the_build() {
        let mut project = ProjectConfig::default();
        let mut task = TaskConfig::default();
        task.options.insert(
            "related_list".to_string(),
            toml::Value::String("RelatedContactList".to_string()),
        );
        project.tasks.insert("add_related_lists".to_string(), task);
        let config = Config::with_project("/work", project);

        let task = TaskRegistry::builtin()
            .build("add_related_lists", &config, &cli(&[]))
            .unwrap();
        assert_eq!(task.key(), "add_related_lists");
    }
}
