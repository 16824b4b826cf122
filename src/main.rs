//! Crypt - encrypted configuration in etcd and consul.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crypt::cli::output;
use crypt::cli::{execute, Cli};
use crypt::core::constants;
use crypt::error::{CodecError, ConfigError, Error, StoreError};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env(constants::LOG_ENV).unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("crypt=debug")
        } else {
            EnvFilter::new("crypt=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(e) = execute(cli.command, cli.settings) {
        let suggestion = match &e {
            Error::Config(ConfigError::KeyRing { .. }) => {
                Some("create one with: age-keygen -o .secring.age")
            }
            Error::Config(ConfigError::UnknownBackend(_)) => {
                Some("use --backend etcd or --backend consul")
            }
            Error::Store(StoreError::Transient(_)) => Some("is the store reachable at --endpoint?"),
            Error::Codec(CodecError::NoIdentities) => {
                Some("get needs the secret key ring: --secret-keyring")
            }
            _ => None,
        };

        output::error(&e.to_string());
        if let Some(hint) = suggestion {
            output::hint(hint);
        }
        std::process::exit(1);
    }
}
