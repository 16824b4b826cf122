//! Error types.
//!
//! Errors are grouped by layer: the store (drivers and the watch loop),
//! the envelope codec, and settings. [`Error`] wraps all of them for callers
//! of the config manager and the CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error returned by the config manager and the CLI.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by store drivers and surfaced through the store abstraction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("key \"{0}\" is not a directory")]
    NotDirectory(String),

    /// Network or availability failure.
    #[error("store unavailable: {0}")]
    Transient(String),

    /// The store refused a write (e.g., the key is a directory).
    #[error("store rejected write: {0}")]
    Rejected(String),

    /// The store answered, but not in a shape the driver understands.
    #[error("invalid store response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Transient(e.to_string())
        }
    }
}

/// Envelope codec failures.
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    EncodeError(String),

    #[error("decode failed: {0}")]
    DecodeError(String),

    #[error("key ring has no recipients to encrypt for")]
    NoRecipients,

    #[error("key ring has no identities to decrypt with")]
    NoIdentities,

    #[error("invalid key in key ring: {0}")]
    InvalidKey(String),

    #[error("failed to read key material: {0}")]
    Io(#[from] std::io::Error),
}

/// Settings and startup failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown backend: {0} (supported: etcd, consul)")]
    UnknownBackend(String),

    #[error("invalid {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to open key ring {}: {source}", path.display())]
    KeyRing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
