//! Command helper methods for Test.

use super::Test;
use assert_cmd::cargo::CommandCargoExt;
use assert_cmd::Command;
use std::process::{Child, Output, Stdio};

/// Environment variables that would leak the caller's settings into a test.
const CRYPT_ENV: &[&str] = &[
    "CRYPT_CONFIG",
    "CRYPT_BACKEND",
    "CRYPT_ENDPOINT",
    "CRYPT_KEYRING",
    "CRYPT_SECRET_KEYRING",
    "CRYPT_BACKOFF",
    "CRYPT_LOG",
];

impl Test {
    /// Create a crypt command running in the test directory.
    ///
    /// Returns a Command configured with:
    /// - Current directory set to the test directory
    /// - Every CRYPT_* variable cleared and colors disabled
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("crypt").expect("failed to find crypt binary");
        for var in CRYPT_ENV {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// A crypt command pointed at `backend` on `endpoint`.
    pub fn at(&self, backend: &str, endpoint: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--backend", backend, "--endpoint", endpoint]);
        cmd
    }

    /// Shortcut for `crypt get`.
    pub fn get(&self, backend: &str, endpoint: &str, key: &str) -> Output {
        self.at(backend, endpoint)
            .args(["get", key])
            .output()
            .expect("failed to run crypt get")
    }

    /// Shortcut for `crypt set` with the value written to a data file first.
    pub fn set(&self, backend: &str, endpoint: &str, key: &str, value: &str) -> Output {
        let data = self.write("value.txt", value);
        self.at(backend, endpoint)
            .arg("set")
            .arg(key)
            .arg("--data")
            .arg(data)
            .output()
            .expect("failed to run crypt set")
    }

    /// Shortcut for `crypt list`.
    pub fn list(&self, backend: &str, endpoint: &str, key: &str) -> Output {
        self.at(backend, endpoint)
            .args(["list", key])
            .output()
            .expect("failed to run crypt list")
    }

    /// Start `crypt watch` in the background with stdout piped.
    ///
    /// The caller owns the child and must kill it.
    pub fn spawn_watch(&self, backend: &str, endpoint: &str, key: &str) -> Child {
        #[allow(deprecated)]
        let mut cmd =
            std::process::Command::cargo_bin("crypt").expect("failed to find crypt binary");
        for var in CRYPT_ENV {
            cmd.env_remove(var);
        }
        cmd.env("NO_COLOR", "1")
            .current_dir(self.dir.path())
            .args(["--backend", backend, "--endpoint", endpoint, "watch", key])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd.spawn().expect("failed to spawn crypt watch")
    }
}
