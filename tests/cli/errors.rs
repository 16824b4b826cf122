//! Tests for error handling and CLI flags.

use predicates::prelude::*;

use crate::support::*;

/// Nothing listens on port 1, so connections are refused immediately.
const UNREACHABLE: &str = "http://127.0.0.1:1";

#[test]
fn test_no_command_shows_usage() {
    let t = Test::new();

    let output = t.cmd().output().unwrap();
    assert!(!output.status.success());
    assert_stderr_contains(&output, "Usage");
}

#[test]
fn test_help_lists_commands() {
    let t = Test::new();

    let output = t.cmd().arg("--help").output().unwrap();
    assert_success(&output);
    let out = stdout(&output);
    for command in ["get", "set", "list", "watch"] {
        assert!(out.contains(command), "help missing {}: {}", command, out);
    }
}

#[test]
fn test_unknown_command_fails() {
    let t = Test::new();

    t.cmd()
        .arg("unknown-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_version_flag() {
    let t = Test::new();

    t.cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("crypt "));
}

#[test]
fn test_set_requires_data_flag() {
    let t = Test::new();

    let output = t.cmd().args(["set", DB_PASSWORD_KEY]).output().unwrap();
    assert!(!output.status.success());
    assert_stderr_contains(&output, "--data");
}

#[test]
fn test_get_without_secret_keyring() {
    let t = Test::empty();

    let output = t.get("etcd", UNREACHABLE, DB_PASSWORD_KEY);
    assert_failure(&output);
    assert_no_stdout(&output);
    assert_stderr_contains(&output, "failed to open key ring .secring.age");
}

#[test]
fn test_set_without_public_keyring() {
    let t = Test::empty();

    let output = t.set("etcd", UNREACHABLE, DB_PASSWORD_KEY, "s3cr3t");
    assert_failure(&output);
    assert_stderr_contains(&output, ".pubring.age");
}

#[test]
fn test_unknown_backend() {
    let t = Test::new();

    let output = t.get("redis", UNREACHABLE, DB_PASSWORD_KEY);
    assert_failure(&output);
    assert_no_stdout(&output);
    assert_stderr_contains(&output, "unknown backend: redis");
}

#[test]
fn test_unreachable_etcd() {
    let t = Test::new();

    let output = t.get("etcd", UNREACHABLE, DB_PASSWORD_KEY);
    assert_failure(&output);
    assert_no_stdout(&output);
    assert_stderr_contains(&output, "store unavailable");
}

#[test]
fn test_unreachable_consul_list() {
    let t = Test::new();

    let output = t.list("consul", UNREACHABLE, "/app");
    assert_failure(&output);
    assert_stderr_contains(&output, "store unavailable");
}

#[test]
fn test_missing_data_file() {
    let t = Test::new();

    let output = t
        .at("etcd", UNREACHABLE)
        .args(["set", DB_PASSWORD_KEY, "--data", "missing.txt"])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "io error");
}

#[test]
fn test_settings_file_with_unknown_field() {
    let t = Test::new();
    let config = t.write("crypt.toml", "backnd = \"etcd\"\n");

    let output = t
        .cmd()
        .arg("--config")
        .arg(config)
        .args(["get", DB_PASSWORD_KEY])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to parse settings file");
}

#[test]
fn test_missing_settings_file() {
    let t = Test::new();

    let output = t
        .cmd()
        .args(["--config", "nope.toml", "get", DB_PASSWORD_KEY])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "failed to read settings file");
}

#[test]
fn test_zero_backoff_is_rejected() {
    let t = Test::new();

    let output = t
        .at("etcd", UNREACHABLE)
        .args(["--backoff", "0", "watch", DB_PASSWORD_KEY])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "invalid backoff_secs");
}

#[test]
fn test_backend_from_environment() {
    let t = Test::new();

    let output = t
        .cmd()
        .env("CRYPT_BACKEND", "redis")
        .args(["get", DB_PASSWORD_KEY])
        .output()
        .unwrap();
    assert_failure(&output);
    assert_stderr_contains(&output, "unknown backend: redis");
}
