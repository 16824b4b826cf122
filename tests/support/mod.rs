//! Test support utilities for crypt integration tests.
//!
//! Provides an isolated working directory with generated key rings and
//! helpers for running the binary against it.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use age::x25519;
use tempfile::TempDir;

/// Test environment with an isolated working directory.
///
/// No process-global state is mutated; child processes use `.current_dir()`
/// so tests can safely run in parallel.
pub struct Test {
    /// Working directory; key rings live here under their default names.
    pub dir: TempDir,
    /// Owner of the generated key rings.
    pub identity: x25519::Identity,
}

impl Test {
    /// Environment with `.secring.age` and `.pubring.age` for a fresh identity.
    pub fn new() -> Self {
        let t = Self::empty();
        t.write(".secring.age", &secret_ring(&t.identity));
        t.write(".pubring.age", &public_ring(&t.identity));
        t
    }

    /// Environment with no key rings on disk.
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        Self {
            dir,
            identity: x25519::Identity::generate(),
        }
    }

    /// Write a file into the working directory and return its path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("failed to write test file");
        path
    }

    /// Armored ciphertext of `plaintext` for this environment's identity.
    pub fn ciphertext(&self, plaintext: &str) -> String {
        let mut ring = public_ring(&self.identity);
        let encoded = crypt::core::codec::encode(plaintext.as_bytes(), &mut ring.as_bytes())
            .expect("failed to encode test value");
        String::from_utf8(encoded).expect("armored ciphertext is utf-8")
    }

    /// Path of a file in the working directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}
