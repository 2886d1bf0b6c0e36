//! Integration tests for the `gatewatch` binary.
//!
//! Argument parsing, config editing and error exits, all without a
//! gateway on the network.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// `gatewatch` with its environment isolated and the config file placed
/// inside `dir`.
fn gatewatch(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("gatewatch");
    cmd.env("GATEWATCH_CONFIG", dir.join("config.toml"))
        .env("HOME", dir)
        .env_remove("GATEWATCH_OUTPUT")
        .env_remove("GATEWATCH_PASSWORD")
        .env_remove("GATEWATCH_GATEWAY__ADDRESS")
        .env_remove("GATEWATCH_GATEWAY__EMAIL")
        .env_remove("RUST_LOG");
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let dir = tempfile::tempdir().unwrap();
    let output = gatewatch(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("run")
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("triggers")),
    );
}

#[test]
fn completions_generate_for_bash() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gatewatch"));
}

// ── Triggers ────────────────────────────────────────────────────────

#[test]
fn triggers_plain_lists_the_catalogue_in_order() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .args(["triggers", "-o", "plain"])
        .assert()
        .success()
        .stdout(
            "battery-charging\nbattery-discharging\nbattery-idle\nsolar-producing\n\
             solar-idle\ngrid-importing\ngrid-exporting\ngrid-idle\n",
        );
}

#[test]
fn subscriptions_show_up_in_the_catalogue() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .args(["config", "subscribe", "grid-exporting", "Pool pump on"])
        .assert()
        .success();

    gatewatch(dir.path())
        .args(["triggers", "-o", "json-compact"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""subscriptions":["Pool pump on"]"#));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn set_address_round_trips_through_the_file() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .args(["config", "set", "address", "192.168.1.50"])
        .assert()
        .success();

    gatewatch(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"address = "192.168.1.50""#));
}

#[test]
fn hostname_is_rejected_as_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .args(["config", "set", "address", "powerwall.local"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("gateway.address"));
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn status_without_an_address_points_at_the_config() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No gateway address configured"));
}

#[test]
fn invalid_address_override_fails_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    gatewatch(dir.path())
        .args(["status", "--address", "gateway.lan"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("dotted-quad"));
}
