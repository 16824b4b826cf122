//! Crypt - encrypted configuration in etcd and consul.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── values        # get / set / list
//! │   ├── watch         # Follow a key
//! │   └── output        # Terminal output helpers
//! └── core/             # Core library components
//!     ├── config        # Settings (TOML + flags)
//!     ├── codec/        # Envelope encryption
//!     │   ├── mod       # Codec trait, key material
//!     │   └── age       # age implementation
//!     ├── store/        # Store abstraction
//!     │   ├── mod       # Driver trait, Store
//!     │   ├── watch     # Watch state machine
//!     │   ├── backoff   # Retry policy
//!     │   ├── etcd      # etcd v2 driver
//!     │   ├── consul    # consul KV driver
//!     │   └── memory    # In-process driver
//!     └── manager       # Config manager (store + codec)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use crypt::core::manager::ConfigManager;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> crypt::error::Result<()> {
//! let keys = std::fs::File::open(".secring.age")?;
//! let manager = ConfigManager::etcd(vec!["http://127.0.0.1:4001".into()], keys)?;
//!
//! manager.set("/app/db/password", b"s3cr3t").await?;
//! assert_eq!(manager.get("/app/db/password").await?, b"s3cr3t");
//!
//! let cancel = CancellationToken::new();
//! let mut watch = manager.watch("/app/db/password", &cancel);
//! while let Some(value) = watch.recv().await {
//!     println!("{:?}", value?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod error;
