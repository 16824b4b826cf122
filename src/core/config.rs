//! Runtime settings.
//!
//! [`Settings`] is built once at startup, from an optional TOML file with
//! command-line overrides applied on top, and handed by reference to the
//! constructors that need it.
//!
//! ```toml
//! backend = "consul"
//! endpoints = ["http://10.0.0.5:8500"]
//! keyring = "/etc/crypt/pubring.age"
//! secret_keyring = "/etc/crypt/secring.age"
//! backoff_secs = 5
//! backoff_max_secs = 60
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::store::{Backoff, Consul, Driver, Etcd};
use crate::error::{ConfigError, Result};

/// Supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Etcd,
    Consul,
}

impl BackendKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Etcd => "etcd",
            Self::Consul => "consul",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            Self::Etcd => constants::ETCD_ENDPOINT,
            Self::Consul => constants::CONSUL_ENDPOINT,
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "etcd" => Ok(Self::Etcd),
            "consul" => Ok(Self::Consul),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Backend, endpoints, key rings and watch policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Backend name: "etcd" (default) or "consul".
    pub backend: String,
    /// Store URLs; empty means the backend's default local endpoint.
    pub endpoints: Vec<String>,
    /// Public key ring used to encrypt on `set`.
    pub keyring: PathBuf,
    /// Secret key ring used to decrypt on `get` and `watch`.
    pub secret_keyring: PathBuf,
    /// Delay between watch retries.
    pub backoff_secs: u64,
    /// When set, watch retries back off exponentially up to this delay.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backoff_max_secs: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend: BackendKind::Etcd.name().to_string(),
            endpoints: Vec::new(),
            keyring: PathBuf::from(constants::PUBLIC_KEYRING),
            secret_keyring: PathBuf::from(constants::SECRET_KEYRING),
            backoff_secs: constants::WATCH_BACKOFF.as_secs(),
            backoff_max_secs: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ReadFile` if the file can't be read, or
    /// `ConfigError::Parse` if the TOML is malformed.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading settings");
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let settings: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        Ok(settings)
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownBackend` or `ConfigError::InvalidValue`.
    pub fn validate(&self) -> Result<()> {
        self.backend_kind()?;

        if self.backoff_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backoff_secs",
                reason: "must be at least 1 second".to_string(),
            }
            .into());
        }
        if let Some(max) = self.backoff_max_secs {
            if max < self.backoff_secs {
                return Err(ConfigError::InvalidValue {
                    field: "backoff_max_secs",
                    reason: format!("{} is below backoff_secs ({})", max, self.backoff_secs),
                }
                .into());
            }
        }
        if self.endpoints.iter().any(|e| e.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "endpoints",
                reason: "endpoint URLs must not be empty".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn backend_kind(&self) -> Result<BackendKind> {
        Ok(self.backend.parse()?)
    }

    /// Configured endpoints, or the backend's default.
    pub fn endpoints(&self) -> Result<Vec<String>> {
        if self.endpoints.is_empty() {
            Ok(vec![self.backend_kind()?.default_endpoint().to_string()])
        } else {
            Ok(self.endpoints.clone())
        }
    }

    pub fn backoff(&self) -> Backoff {
        let initial = Duration::from_secs(self.backoff_secs);
        match self.backoff_max_secs {
            Some(max) => Backoff::exponential(initial, Duration::from_secs(max)),
            None => Backoff::fixed(initial),
        }
    }

    /// Build the driver named by `backend`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownBackend` for an unsupported backend, or
    /// the driver's construction error.
    pub fn driver(&self) -> Result<Arc<dyn Driver>> {
        let endpoints = self.endpoints()?;
        let kind = self.backend_kind()?;
        debug!(backend = %kind, endpoints = ?endpoints, "creating driver");
        let driver: Arc<dyn Driver> = match kind {
            BackendKind::Etcd => Arc::new(Etcd::new(endpoints)?),
            BackendKind::Consul => Arc::new(Consul::new(endpoints)?),
        };
        Ok(driver)
    }
}
