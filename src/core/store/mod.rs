//! Key-value store access.
//!
//! A [`Driver`] speaks one store's native protocol. [`Store`] puts the
//! uniform contract on top of any driver: plain reads and writes, leaf-only
//! directory listings, and watches driven by a long-poll state machine that
//! works the same whatever notification model the store uses.
//!
//! ## Adding a New Backend
//!
//! 1. Implement the `Driver` trait
//! 2. Add the implementation in a new file (e.g., `zookeeper.rs`)
//! 3. Re-export from this module and add it to `BackendKind`
//!
//! ## Example
//!
//! ```ignore
//! #[derive(Debug)]
//! struct Zookeeper { /* ... */ }
//!
//! #[async_trait]
//! impl Driver for Zookeeper {
//!     fn name(&self) -> &'static str { "zookeeper" }
//!     async fn read(&self, key: &str) -> Result<Node, StoreError> { /* ... */ }
//!     async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError> { /* ... */ }
//!     async fn list(&self, key: &str) -> Result<Vec<Entry>, StoreError> { /* ... */ }
//!     async fn wait(
//!         &self,
//!         key: &str,
//!         after: Revision,
//!         cancel: &CancellationToken,
//!     ) -> Result<Option<Node>, StoreError> { /* ... */ }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::types::{Entry, Node, Revision};
use crate::error::StoreError;

mod backoff;
mod consul;
mod etcd;
mod http;
mod memory;
mod watch;

pub use backoff::Backoff;
pub use consul::Consul;
pub use etcd::Etcd;
pub use memory::Memory;
pub use watch::WatchStream;

/// Raw store operations, implemented once per backend technology.
#[async_trait]
pub trait Driver: Send + Sync + fmt::Debug {
    /// Backend name for logs and display.
    fn name(&self) -> &'static str;

    /// Current value of `key` and the store revision it was read at.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the key does not exist,
    /// `StoreError::Transient` if the store cannot be reached.
    async fn read(&self, key: &str) -> Result<Node, StoreError>;

    /// Persist `value` at `key`, creating it if absent.
    async fn write(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Direct children of a directory key.
    ///
    /// # Errors
    ///
    /// `StoreError::NotDirectory` if `key` holds a value.
    async fn list(&self, key: &str) -> Result<Vec<Entry>, StoreError>;

    /// Block until `key` has a revision newer than `after`.
    ///
    /// Returns `Ok(None)` if `cancel` fires first. Dropping the returned
    /// future aborts any request in flight.
    async fn wait(
        &self,
        key: &str,
        after: Revision,
        cancel: &CancellationToken,
    ) -> Result<Option<Node>, StoreError>;
}

/// Uniform store contract over a shared driver.
///
/// Cloning is cheap; clones share the driver and its connection pool.
#[derive(Clone)]
pub struct Store {
    driver: Arc<dyn Driver>,
    backoff: Backoff,
}

impl Store {
    pub fn new(driver: impl Driver + 'static) -> Self {
        Self::from_arc(Arc::new(driver))
    }

    pub fn from_arc(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            backoff: Backoff::default(),
        }
    }

    /// Replace the retry policy used by watches started after this call.
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Fetch the current value at `key`.
    ///
    /// # Errors
    ///
    /// `StoreError::NotFound` if the key is absent, or the driver's failure.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        debug!(backend = self.driver.name(), key, "get");
        Ok(self.driver.read(key).await?.value)
    }

    /// Write `value` at `key`.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        debug!(backend = self.driver.name(), key, len = value.len(), "set");
        self.driver.write(key, value).await
    }

    /// Leaf children of the directory `key`, sorted.
    ///
    /// Nested directories are left out rather than descended into.
    ///
    /// # Errors
    ///
    /// `StoreError::NotDirectory` if `key` holds a value.
    pub async fn list(&self, key: &str) -> Result<Vec<String>, StoreError> {
        debug!(backend = self.driver.name(), key, "list");
        let mut leaves: Vec<String> = self
            .driver
            .list(key)
            .await?
            .into_iter()
            .filter(|entry| !entry.dir)
            .map(|entry| entry.key)
            .collect();
        leaves.sort();
        Ok(leaves)
    }

    /// Start watching `key`.
    ///
    /// The stream yields the current value first and then every later
    /// revision, with errors reported in-line and retried. It ends only when
    /// `cancel` fires or the stream is dropped. Must be called from within a
    /// tokio runtime.
    pub fn watch(&self, key: &str, cancel: &CancellationToken) -> WatchStream {
        debug!(backend = self.driver.name(), key, "watch");
        watch::spawn(
            Arc::clone(&self.driver),
            key.to_string(),
            cancel.child_token(),
            self.backoff,
        )
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("driver", &self.driver)
            .field("backoff", &self.backoff)
            .finish()
    }
}
