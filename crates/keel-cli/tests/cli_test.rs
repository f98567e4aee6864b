use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn keel() -> assert_cmd::Command {
    cargo_bin_cmd!("keel")
}

// ── Help / Version ──

#[test]
fn shows_help() {
    keel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build and release apps on a keel rack"));
}

#[test]
fn shows_version() {
    keel()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("keel"));
}

#[test]
fn help_lists_commands() {
    keel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("builds"))
        .stdout(predicate::str::contains("releases"));
}

#[test]
fn build_help_shows_flags() {
    keel()
        .args(["build", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--incremental"))
        .stdout(predicate::str::contains("--no-cache"))
        .stdout(predicate::str::contains("--description"));
}

#[test]
fn builds_copy_requires_destination() {
    keel()
        .args(["builds", "copy", "BABCDEFGHI"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DEST_APP"));
}

#[test]
fn builds_delete_requires_id() {
    keel()
        .args(["builds", "delete"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<ID>"));
}

#[test]
fn builds_help_lists_delete() {
    keel()
        .args(["builds", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("Delete a build"));
}

#[test]
fn releases_promote_requires_id() {
    keel()
        .args(["releases", "promote"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<ID>"));
}

#[test]
fn unknown_command_fails() {
    keel().arg("deploy").assert().failure();
}

// ── Configuration ──

#[test]
fn invalid_config_is_reported() {
    let tmp = TempDir::new().unwrap();
    std::fs::write(tmp.path().join("keel.toml"), "[rack\nname = ").unwrap();

    keel()
        .current_dir(tmp.path())
        .arg("releases")
        .assert()
        .failure()
        .stderr(predicate::str::contains("keel.toml"));
}

#[test]
fn build_of_missing_directory_fails() {
    let tmp = TempDir::new().unwrap();

    keel()
        .current_dir(tmp.path())
        .args(["build", "does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist"));
}
