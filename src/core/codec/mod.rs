//! Envelope encryption for stored values.
//!
//! A [`Codec`] turns plaintext into ciphertext and back using key material
//! read from a key source. The store only ever sees ciphertext; the config
//! manager hands a fresh reader over its [`KeyMaterial`] to the codec on
//! every call.
//!
//! ## Adding a New Codec
//!
//! 1. Implement the `Codec` trait
//! 2. Add the implementation in a new file next to `age.rs`
//! 3. Re-export from this module

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::error::CodecError;

mod age;

pub use age::{Age, KeyRing};

/// Envelope codec trait.
///
/// Key sources are read-once streams. Public key rings are enough to
/// encode; decoding needs the private half.
pub trait Codec: Send + Sync {
    /// Encrypt `plaintext` for every recipient found in `keys`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::NoRecipients` if the key source holds no usable
    /// keys, or `CodecError::EncodeError` if encryption fails.
    fn encode(&self, plaintext: &[u8], keys: &mut dyn Read) -> Result<Vec<u8>, CodecError>;

    /// Decrypt `ciphertext` with the identities found in `keys`.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::DecodeError` for malformed or foreign ciphertext
    /// and for ciphertext not addressed to any of the identities.
    fn decode(&self, ciphertext: &[u8], keys: &mut dyn Read) -> Result<Vec<u8>, CodecError>;

    /// Codec name for display.
    fn name(&self) -> &'static str;
}

/// Key ring bytes, loaded once and shared read-only for the owner's lifetime.
///
/// The buffer is wiped when the last clone is dropped.
#[derive(Clone)]
pub struct KeyMaterial(Arc<Zeroizing<Vec<u8>>>);

impl KeyMaterial {
    /// Drain a key source into memory.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Io` if the source cannot be read.
    pub fn read_from(mut source: impl Read) -> Result<Self, CodecError> {
        let mut bytes = Zeroizing::new(Vec::new());
        source.read_to_end(&mut bytes)?;
        Ok(Self(Arc::new(bytes)))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Arc::new(Zeroizing::new(bytes.into())))
    }

    /// A fresh reader over the key ring, released when it goes out of scope.
    pub fn reader(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

/// Encode with the default codec.
///
/// # Errors
///
/// See [`Codec::encode`].
pub fn encode(plaintext: &[u8], keys: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
    Age.encode(plaintext, keys)
}

/// Decode with the default codec.
///
/// # Errors
///
/// See [`Codec::decode`].
pub fn decode(ciphertext: &[u8], keys: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
    Age.decode(ciphertext, keys)
}
