//! Command-line interface.

pub mod output;
pub mod values;
pub mod watch;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::debug;

use crate::core::config::Settings;
use crate::error::Result;

/// Crypt - encrypted configuration in etcd and consul.
#[derive(Parser)]
#[command(
    name = "crypt",
    about = "Store and retrieve encrypted configuration in etcd or consul",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub settings: SettingsArgs,

    /// Show debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Flags that override the settings file.
#[derive(Args, Debug, Default)]
pub struct SettingsArgs {
    /// Settings file (TOML)
    #[arg(long, global = true, env = "CRYPT_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Backend provider: etcd or consul
    #[arg(long, global = true, env = "CRYPT_BACKEND")]
    pub backend: Option<String>,

    /// Backend URL (repeatable, or comma separated)
    #[arg(
        long = "endpoint",
        global = true,
        env = "CRYPT_ENDPOINT",
        value_delimiter = ',',
        value_name = "URL"
    )]
    pub endpoints: Vec<String>,

    /// Path to the public key ring (used by set)
    #[arg(long, global = true, env = "CRYPT_KEYRING", value_name = "FILE")]
    pub keyring: Option<PathBuf>,

    /// Path to the secret key ring (used by get and watch)
    #[arg(long, global = true, env = "CRYPT_SECRET_KEYRING", value_name = "FILE")]
    pub secret_keyring: Option<PathBuf>,

    /// Seconds to wait before retrying a failed watch
    #[arg(long, global = true, env = "CRYPT_BACKOFF", value_name = "SECS")]
    pub backoff: Option<u64>,
}

impl SettingsArgs {
    /// Settings file (if any) with flags applied on top.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file can't be loaded or the result is
    /// invalid.
    pub fn resolve(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::load(path)?,
            None => Settings::default(),
        };

        if let Some(backend) = self.backend {
            settings.backend = backend;
        }
        if !self.endpoints.is_empty() {
            settings.endpoints = self.endpoints;
        }
        if let Some(keyring) = self.keyring {
            settings.keyring = keyring;
        }
        if let Some(secret_keyring) = self.secret_keyring {
            settings.secret_keyring = secret_keyring;
        }
        if let Some(backoff) = self.backoff {
            settings.backoff_secs = backoff;
        }

        settings.validate()?;
        debug!(?settings, "settings resolved");
        Ok(settings)
    }
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Retrieve and decrypt the value of a key
    Get {
        /// Configuration key (e.g., /app/db/password)
        key: String,
    },

    /// Encrypt a file and store it at a key
    Set {
        /// Configuration key
        key: String,
        /// Path to the file holding the value
        #[arg(short, long, value_name = "FILE")]
        data: PathBuf,
    },

    /// List the values directly under a directory key
    List {
        /// Directory key
        key: String,
    },

    /// Print a key's value every time it changes (Ctrl-C to stop)
    Watch {
        /// Configuration key
        key: String,
    },
}

/// Execute a command against the configured backend.
pub fn execute(command: Command, settings: SettingsArgs) -> Result<()> {
    use Command::*;

    let settings = settings.resolve()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match command {
            Get { key } => values::get(&settings, &key).await,
            Set { key, data } => values::set(&settings, &key, &data).await,
            List { key } => values::list(&settings, &key).await,
            Watch { key } => watch::execute(&settings, &key).await,
        }
    })
}
