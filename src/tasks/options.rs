//! tasks::options
//!
//! Task option schemas and resolved option values.
//!
//! # Precedence
//!
//! Options are resolved once, before a task is built:
//! 1. Schema defaults
//! 2. `[tasks.<key>.options]` in `metaship.toml`
//! 3. `-o name=value` on the command line
//!
//! A name that is not in the task's schema is rejected at every layer, so a
//! typo in the project file fails just as loudly as one on the command line.

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::core::config::ConfigError;

/// One entry in a task's option schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

impl OptionSpec {
    pub const fn optional(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: false,
            default: None,
            description,
        }
    }

    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            required: true,
            default: None,
            description,
        }
    }

    pub const fn with_default(
        name: &'static str,
        default: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            required: false,
            default: Some(default),
            description,
        }
    }
}

/// Validated option values for one task invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
    task: String,
    values: BTreeMap<String, String>,
}

impl TaskOptions {
    /// Merge defaults, configured values and command-line values.
    ///
    /// # Errors
    ///
    /// - `ConfigError::UnknownOption` for a name outside the schema
    /// - `ConfigError::MissingOption` for a required option left unset
    pub fn resolve(
        task: &str,
        schema: &[OptionSpec],
        configured: &BTreeMap<String, String>,
        cli: &BTreeMap<String, String>,
    ) -> Result<Self, ConfigError> {
        for name in configured.keys().chain(cli.keys()) {
            if !schema.iter().any(|spec| spec.name == name) {
                return Err(ConfigError::UnknownOption {
                    task: task.to_string(),
                    option: name.clone(),
                });
            }
        }

        let mut values = BTreeMap::new();
        for spec in schema {
            if let Some(default) = spec.default {
                values.insert(spec.name.to_string(), default.to_string());
            }
        }
        values.extend(configured.iter().map(|(k, v)| (k.clone(), v.clone())));
        values.extend(cli.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(missing) = schema
            .iter()
            .find(|spec| spec.required && !values.contains_key(spec.name))
        {
            return Err(ConfigError::MissingOption {
                task: task.to_string(),
                option: missing.name.to_string(),
            });
        }

        Ok(Self {
            task: task.to_string(),
            values,
        })
    }

    /// Options built directly from pairs, bypassing schema checks.
    pub fn from_pairs<'a>(task: &str, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            task: task.to_string(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> Result<&str, ConfigError> {
        self.get(name).ok_or_else(|| ConfigError::MissingOption {
            task: self.task.clone(),
            option: name.to_string(),
        })
    }

    /// Boolean option; unset is `false`.
    pub fn flag(&self, name: &str) -> Result<bool, ConfigError> {
        match self.get(name).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) => match v.as_str() {
                "true" | "yes" | "1" => Ok(true),
                "false" | "no" | "0" | "" => Ok(false),
                _ => Err(self.invalid(name, "expected true or false")),
            },
        }
    }

    /// Comma-separated list; unset is empty.
    pub fn list(&self, name: &str) -> Vec<String> {
        self.get(name)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Comma-separated list of parsed values.
    pub fn parsed_list<T>(&self, name: &str) -> Result<Vec<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.list(name)
            .iter()
            .map(|item| {
                item.parse::<T>()
                    .map_err(|e| self.invalid(name, &format!("'{}': {}", item, e)))
            })
            .collect()
    }

    pub(crate) fn invalid(&self, name: &str, message: &str) -> ConfigError {
        ConfigError::InvalidOption {
            task: self.task.clone(),
            option: name.to_string(),
            message: message.to_string(),
        }
    }
}

/// Parse one `name=value` command-line option.
pub fn parse_option_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCHEMA: &[OptionSpec] = &[
        OptionSpec::required("related_list", "Related list id"),
        OptionSpec::optional("fields", "Fields to show"),
        OptionSpec::with_default("unmanaged", "true", "Strip namespace tokens"),
    ];

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    mod resolve {
        use super::*;

        #[test]
        fn precedence_default_config_cli() {
            let options = TaskOptions::resolve(
                "add_related_lists",
                SCHEMA,
                &map(&[("related_list", "FromConfig"), ("fields", "A")]),
                &map(&[("related_list", "FromCli")]),
            )
            .unwrap();

            assert_eq!(options.get("related_list"), Some("FromCli"));
            assert_eq!(options.get("fields"), Some("A"));
            assert_eq!(options.get("unmanaged"), Some("true"));
        }

        #[test]
        fn unknown_option_rejected() {
            let err = TaskOptions::resolve(
                "add_related_lists",
                SCHEMA,
                &map(&[]),
                &map(&[("related_list", "X"), ("colour", "blue")]),
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::UnknownOption { ref option, .. } if option == "colour"));
        }

        #[test]
        fn unknown_configured_option_rejected() {
            let err = TaskOptions::resolve(
                "add_related_lists",
                SCHEMA,
                &map(&[("colour", "blue")]),
                &map(&[("related_list", "X")]),
            )
            .unwrap_err();
            assert!(matches!(err, ConfigError::UnknownOption { .. }));
        }

        #[test]
        fn missing_required_rejected() {
            let err = TaskOptions::resolve("add_related_lists", SCHEMA, &map(&[]), &map(&[]))
                .unwrap_err();
            assert_eq!(
                err.to_string(),
                "task 'add_related_lists' requires option 'related_list'"
            );
        }
    }

    mod values {
        use super::*;

        #[test]
        fn flags() {
            let options =
                TaskOptions::from_pairs("t", [("a", "True"), ("b", "no"), ("c", "maybe")]);
            assert!(options.flag("a").unwrap());
            assert!(!options.flag("b").unwrap());
            assert!(!options.flag("missing").unwrap());
            assert!(matches!(
                options.flag("c"),
                Err(ConfigError::InvalidOption { .. })
            ));
        }

        #[test]
        fn lists_trim_and_drop_empties() {
            let options = TaskOptions::from_pairs("t", [("fields", " A, B ,,C ")]);
            assert_eq!(options.list("fields"), vec!["A", "B", "C"]);
            assert!(options.list("missing").is_empty());
        }

        #[test]
        fn parsed_list_reports_bad_item() {
            let options = TaskOptions::from_pairs("t", [("n", "1,x")]);
            let err = options.parsed_list::<u32>("n").unwrap_err();
            assert!(err.to_string().contains("'x'"));
        }
    }

    #[test]
    fn option_pairs() {
        assert_eq!(
            parse_option_pair("fields=A,B").unwrap(),
            ("fields".to_string(), "A,B".to_string())
        );
        assert_eq!(
            parse_option_pair("path=a=b").unwrap(),
            ("path".to_string(), "a=b".to_string())
        );
        assert!(parse_option_pair("novalue").is_err());
        assert!(parse_option_pair("=x").is_err());
    }
}
