//! Encrypted configuration on top of a store.
//!
//! [`ConfigManager`] encodes every value on its way into the store and
//! decodes it on the way out, so callers only see plaintext and the store
//! only ever holds ciphertext.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::codec::{Age, Codec, KeyMaterial};
use crate::core::config::Settings;
use crate::core::store::{Consul, Etcd, Store, WatchStream};
use crate::error::{ConfigError, Result};

/// Reads, writes and watches encrypted configuration values.
pub struct ConfigManager<C: Codec = Age> {
    store: Store,
    keys: KeyMaterial,
    codec: Arc<C>,
}

impl ConfigManager<Age> {
    /// Wrap `store`, reading the key ring from `keys` once.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Io` if the key source can't be read.
    pub fn new(store: Store, keys: impl Read) -> Result<Self> {
        Ok(Self::with_codec(store, KeyMaterial::read_from(keys)?, Age))
    }

    /// A manager backed by etcd.
    pub fn etcd(machines: Vec<String>, keys: impl Read) -> Result<Self> {
        Self::new(Store::new(Etcd::new(machines)?), keys)
    }

    /// A manager backed by consul.
    pub fn consul(machines: Vec<String>, keys: impl Read) -> Result<Self> {
        Self::new(Store::new(Consul::new(machines)?), keys)
    }

    /// Build the configured backend and load the key ring at `keyring`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::KeyRing` if the key ring can't be opened, or any
    /// settings or driver error.
    pub fn open(settings: &Settings, keyring: &Path) -> Result<Self> {
        settings.validate()?;
        let store = Store::from_arc(settings.driver()?).with_backoff(settings.backoff());

        debug!(path = %keyring.display(), "loading key ring");
        let file = File::open(keyring).map_err(|source| ConfigError::KeyRing {
            path: keyring.to_path_buf(),
            source,
        })?;
        Self::new(store, file)
    }
}

impl<C: Codec> ConfigManager<C> {
    pub fn with_codec(store: Store, keys: KeyMaterial, codec: C) -> Self {
        Self {
            store,
            keys,
            codec: Arc::new(codec),
        }
    }

    /// The wrapped store. Values read through it are still encrypted.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Fetch and decrypt the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns the store's error, or `CodecError::DecodeError` if the stored
    /// value can't be decrypted with this key ring.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let value = self.store.get(key).await?;
        debug!(codec = self.codec.name(), key, "decoding");
        Ok(self.codec.decode(&value, &mut self.keys.reader())?)
    }

    /// Encrypt `value` and store it at `key`.
    ///
    /// # Errors
    ///
    /// Returns a `CodecError` if encryption fails, or the store's error.
    pub async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        debug!(codec = self.codec.name(), key, "encoding");
        let encoded = self.codec.encode(value, &mut self.keys.reader())?;
        self.store.set(key, &encoded).await?;
        Ok(())
    }

    /// Leaf children of `key`. Listings are not encrypted.
    pub async fn list(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.store.list(key).await?)
    }

    /// Watch `key`, decrypting each value as it is received.
    ///
    /// A value that fails to decrypt is reported as an error for that item;
    /// the watch keeps running.
    pub fn watch(&self, key: &str, cancel: &CancellationToken) -> DecodedWatch<C> {
        debug!(codec = self.codec.name(), key, "decoding watch");
        DecodedWatch {
            inner: self.store.watch(key, cancel),
            keys: self.keys.clone(),
            codec: Arc::clone(&self.codec),
        }
    }
}

/// A store watch that yields plaintext.
pub struct DecodedWatch<C: Codec = Age> {
    inner: WatchStream,
    keys: KeyMaterial,
    codec: Arc<C>,
}

impl<C: Codec> DecodedWatch<C> {
    /// Next decrypted value or error, or `None` once cancelled.
    pub async fn recv(&mut self) -> Option<Result<Vec<u8>>> {
        let response = self.inner.recv().await?;
        Some(match response {
            Ok(value) => self
                .codec
                .decode(&value, &mut self.keys.reader())
                .map_err(Into::into),
            Err(e) => Err(e.into()),
        })
    }

    /// Stop the watch. Calling this more than once is harmless.
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    /// Wait for the underlying watch task to exit after cancellation.
    pub async fn stopped(&mut self) {
        self.inner.stopped().await;
    }
}
