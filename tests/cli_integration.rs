//! End-to-end tests for the `metaship` binary.
//!
//! These tests invoke the binary directly and check its exit status and
//! output.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for running metaship.
fn metaship() -> Command {
    let mut cmd = Command::cargo_bin("metaship").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

const PROJECT: &str = r#"[package]
name = "Cumulo"
namespace = "cumulo"
api_version = "48.0"

[repo]
owner = "acme"
name = "cumulo"
"#;

const CLASS_META: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ApexClass xmlns="http://soap.sforce.com/2006/04/metadata">
    <apiVersion>42.0</apiVersion>
    <status>Active</status>
</ApexClass>
"#;

fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("metaship.toml"), PROJECT).unwrap();
    fs::create_dir_all(dir.path().join("src/classes")).unwrap();
    fs::write(dir.path().join("src/classes/Foo.cls-meta.xml"), CLASS_META).unwrap();
    dir
}

fn read_meta(dir: &Path) -> String {
    fs::read_to_string(dir.join("src/classes/Foo.cls-meta.xml")).unwrap()
}

mod global {
    use super::*;

    #[test]
    fn version_flag_works() {
        metaship()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("metaship"));
    }

    #[test]
    fn help_lists_commands() {
        metaship()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("task"))
            .stdout(predicate::str::contains("completion"));
    }

    #[test]
    fn completion_bash() {
        metaship()
            .args(["completion", "bash"])
            .assert()
            .success()
            .stdout(predicate::str::contains("_metaship()"));
    }
}

mod task {
    use super::*;

    #[test]
    fn list_shows_every_builtin() {
        let mut assert = metaship().args(["task", "list"]).assert().success();
        for key in [
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
        ] {
            assert = assert.stdout(predicate::str::contains(key));
        }
    }

    #[test]
    fn info_shows_options() {
        metaship()
            .args(["task", "info", "add_related_lists"])
            .assert()
            .success()
            .stdout(predicate::str::contains("related_list (required)"))
            .stdout(predicate::str::contains("unmanaged [default: true]"));
    }

    #[test]
    fn info_unknown_task_fails() {
        metaship()
            .args(["task", "info", "launch_rockets"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("unknown task 'launch_rockets'"));
    }

    #[test]
    fn run_unknown_option_fails_before_running() {
        let dir = project();
        metaship()
            .arg("--cwd")
            .arg(dir.path())
            .args(["task", "run", "update_api_version", "-o", "colour=blue"])
            .assert()
            .failure()
            .stderr(predicate::str::contains(
                "task 'update_api_version' does not accept option 'colour'",
            ));
        assert!(read_meta(dir.path()).contains("<apiVersion>42.0</apiVersion>"));
    }

    #[test]
    fn run_update_api_version_uses_project_default() {
        let dir = project();
        metaship()
            .arg("--cwd")
            .arg(dir.path())
            .args(["task", "run", "update_api_version"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Updated 1 file(s) (1 change(s))"));
        assert!(read_meta(dir.path()).contains("<apiVersion>48.0</apiVersion>"));
    }

    #[test]
    fn run_cli_option_overrides_project() {
        let dir = project();
        metaship()
            .arg("--cwd")
            .arg(dir.path().join("src"))
            .args(["task", "run", "update_api_version", "-o", "version=50.0"])
            .assert()
            .success();
        assert!(read_meta(dir.path()).contains("<apiVersion>50.0</apiVersion>"));
    }

    #[test]
    fn run_quiet_prints_nothing() {
        let dir = project();
        metaship()
            .arg("--cwd")
            .arg(dir.path())
            .args(["--quiet", "task", "run", "update_api_version"])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());
    }

    #[test]
    fn merge_branch_requires_token() {
        let dir = project();
        metaship()
            .arg("--cwd")
            .arg(dir.path())
            .env_remove("GITHUB_TOKEN")
            .args(["task", "run", "merge_branch"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("GITHUB_TOKEN"));
    }
}
