//! CLI smoke tests for the changemap binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use git2::{Repository, Signature};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn changemap() -> Command {
    cargo_bin_cmd!("changemap")
}

/// Fixture mirror with `count` trailer-carrying commits.
fn build_mirror(dir: &Path, count: i64) {
    let repo = Repository::init(dir).unwrap();
    let mut config = repo.config().unwrap();
    config.set_str("user.name", "test").unwrap();
    config.set_str("user.email", "test@test.com").unwrap();
    drop(config);

    for i in 1..=count {
        fs::write(dir.join("file.txt"), format!("content {i}")).unwrap();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
            .unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("test", "test@test.com").unwrap();
        let message =
            format!("change {i}\n\n[git-p4: depot-paths = \"//depot/\": change = {i}]");
        if let Ok(head) = repo.head() {
            let parent = head.peel_to_commit().unwrap();
            repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[&parent])
                .unwrap();
        } else {
            repo.commit(Some("HEAD"), &sig, &sig, &message, &tree, &[])
                .unwrap();
        }
    }
}

/// Workspace with a config file, a mirror, and a database path.
fn setup_workspace() -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let mirror = dir.path().join("mirror");
    fs::create_dir_all(&mirror).unwrap();
    build_mirror(&mirror, 3);

    let config_path = dir.path().join("changemap.toml");
    fs::write(
        &config_path,
        format!(
            r#"
db_path = "{db}"

[[repos]]
name = "acme/widgets"
mirror = "{mirror}"
"#,
            db = dir.path().join("changemap.sqlite").display(),
            mirror = mirror.display(),
        ),
    )
    .unwrap();
    (dir, config_path)
}

#[test]
fn test_help() {
    changemap().arg("--help").assert().success();
}

#[test]
fn test_version() {
    changemap().arg("--version").assert().success();
}

#[test]
fn test_missing_config_fails() {
    changemap()
        .args(["--config", "/nonexistent/changemap.toml", "status"])
        .assert()
        .failure();
}

#[test]
fn test_sync_then_status_and_resolve() {
    let (_dir, config_path) = setup_workspace();
    let config = config_path.to_str().unwrap();

    changemap()
        .args(["--config", config, "sync", "acme/widgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mapped 3 new commits"));

    // A second sync finds nothing new.
    changemap()
        .args(["--config", config, "sync", "acme/widgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already mapped up to HEAD"));

    changemap()
        .args(["--config", config, "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme/widgets"))
        .stdout(predicate::str::contains("3"));

    // changelist -> commit -> changelist round trip through the CLI.
    let output = changemap()
        .args(["--config", config, "resolve", "acme/widgets", "--changelist", "2"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let sha = String::from_utf8(output).unwrap().trim().to_string();
    assert_eq!(sha.len(), 40);

    changemap()
        .args(["--config", config, "resolve", "acme/widgets", "--commit", &sha])
        .assert()
        .success()
        .stdout(predicate::str::contains("2"));
}

#[test]
fn test_sync_unknown_repo_fails() {
    let (_dir, config_path) = setup_workspace();
    changemap()
        .args(["--config", config_path.to_str().unwrap(), "sync", "nope"])
        .assert()
        .failure();
}

#[test]
fn test_resolve_requires_exactly_one_selector() {
    let (_dir, config_path) = setup_workspace();
    let config = config_path.to_str().unwrap();

    changemap()
        .args(["--config", config, "resolve", "acme/widgets"])
        .assert()
        .failure();

    changemap()
        .args([
            "--config",
            config,
            "resolve",
            "acme/widgets",
            "--changelist",
            "1",
            "--commit",
            "abc",
        ])
        .assert()
        .failure();
}
