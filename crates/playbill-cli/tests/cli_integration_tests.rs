//! CLI integration tests for playbill
//!
//! Tests the playbill CLI commands end-to-end using assert_cmd. Each
//! test gets its own config directory and never reaches the network or
//! the OS keyring: only local validation and config paths are covered.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Helper to create a command with an isolated config directory
#[allow(deprecated)]
fn playbill_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("playbill").unwrap();
    cmd.env("PLAYBILL_CONFIG_DIR", config_dir.path());
    cmd.env_remove("PLAYBILL_API_BASE");
    cmd.env_remove("PLAYBILL_PASSWORD");
    cmd
}

#[test]
fn test_help_command() {
    let temp_dir = TempDir::new().unwrap();
    playbill_cmd(&temp_dir)
        .args(["--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Find the event behind the poster"));
}

#[test]
fn test_version_output() {
    let temp_dir = TempDir::new().unwrap();
    playbill_cmd(&temp_dir)
        .args(["--version"])
        .assert()
        .success()
        .stdout(predicate::str::contains("playbill"));
}

#[test]
fn test_config_set_and_get() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["config", "set", "api.base_url", "https://events.example.com/api/v1/"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set api.base_url"));

    // Trailing slash is trimmed on write
    playbill_cmd(&temp_dir)
        .args(["config", "get", "api.base_url"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://events.example.com/api/v1"))
        .stdout(predicate::str::contains("/api/v1/").not());

    assert!(temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_config_list_shows_all_keys() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("api.base_url"))
        .stdout(predicate::str::contains("api.timeout_secs"))
        .stdout(predicate::str::contains("events.favorite_sync = server"));
}

#[test]
fn test_config_path_points_into_config_dir() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_rejects_unknown_key() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["config", "get", "llm.api_key"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_rejects_invalid_favorite_policy() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["config", "set", "events.favorite_sync", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Valid options: server, local"));
}

#[test]
fn test_config_reset_removes_file() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["config", "set", "api.timeout_secs", "120"])
        .assert()
        .success();
    assert!(temp_dir.path().join("config.toml").exists());

    playbill_cmd(&temp_dir)
        .args(["config", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reset"));
    assert!(!temp_dir.path().join("config.toml").exists());
}

#[test]
fn test_events_create_rejects_blank_title() {
    let temp_dir = TempDir::new().unwrap();

    // Local validation fires before any request is built
    playbill_cmd(&temp_dir)
        .args(["events", "create", "--title", "   "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
}

#[test]
fn test_events_create_rejects_bad_date() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["events", "create", "--title", "Jazz Night", "--date", "soonish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid date"));
}

#[test]
fn test_events_update_requires_a_field() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["events", "update", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nothing to update"));
}

#[test]
fn test_events_delete_requires_force() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["events", "delete", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--force"));
}

#[test]
fn test_events_delete_quiet_without_force_prints_nothing() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["--quiet", "events", "delete", "5"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_lookup_rejects_non_image() {
    let temp_dir = TempDir::new().unwrap();
    let notes = temp_dir.path().join("notes.txt");
    std::fs::write(&notes, "not a poster").unwrap();

    playbill_cmd(&temp_dir)
        .args(["lookup"])
        .arg(&notes)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a recognized image"));
}

#[test]
fn test_lookup_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("gone.png");

    playbill_cmd(&temp_dir)
        .args(["lookup"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No such file"));
}

#[test]
fn test_login_requires_password_source() {
    let temp_dir = TempDir::new().unwrap();

    playbill_cmd(&temp_dir)
        .args(["login", "goer@example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PLAYBILL_PASSWORD"));
}
