//! Constants used throughout crypt.
//!
//! Centralizes default paths, endpoints and policy values.

use std::time::Duration;

/// Default public key ring, used by `set`.
pub const PUBLIC_KEYRING: &str = ".pubring.age";

/// Default secret key ring, used by `get` and `watch`.
pub const SECRET_KEYRING: &str = ".secring.age";

/// Default etcd client URL.
pub const ETCD_ENDPOINT: &str = "http://127.0.0.1:4001";

/// Default consul agent URL.
pub const CONSUL_ENDPOINT: &str = "http://127.0.0.1:8500";

/// Delay between watch retries after a failure.
pub const WATCH_BACKOFF: Duration = Duration::from_secs(5);

/// Server-side timeout requested for consul blocking queries.
pub const CONSUL_WAIT: &str = "5m";

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "CRYPT_LOG";
