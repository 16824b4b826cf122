//! Age envelope codec.
//!
//! Values are encrypted to x25519 recipients and stored ASCII-armored, so
//! they survive stores that only accept text.

use std::io::{Read, Write};

use ::age::x25519;
use tracing::trace;
use zeroize::Zeroizing;

use super::Codec;
use crate::error::CodecError;

const SECRET_KEY_PREFIX: &str = "AGE-SECRET-KEY-";

/// Age-based envelope codec using x25519 keys.
pub struct Age;

/// Parsed contents of an age key ring.
///
/// One key per line; blank lines and `#` comments are skipped. Secret keys
/// contribute both an identity and its public recipient.
pub struct KeyRing {
    pub identities: Vec<x25519::Identity>,
    pub recipients: Vec<x25519::Recipient>,
}

impl KeyRing {
    /// Parse a key ring from a key source.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::InvalidKey` for any line that is not an age key.
    pub fn read(source: &mut dyn Read) -> Result<Self, CodecError> {
        let mut text = Zeroizing::new(String::new());
        source.read_to_string(&mut text)?;

        let mut identities = Vec::new();
        let mut recipients = Vec::new();

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if line.starts_with(SECRET_KEY_PREFIX) {
                let identity: x25519::Identity = line.parse().map_err(|e: &str| {
                    CodecError::InvalidKey(format!("line {}: {}", n + 1, e))
                })?;
                recipients.push(identity.to_public());
                identities.push(identity);
            } else {
                let recipient = line.parse::<x25519::Recipient>().map_err(|_| {
                    CodecError::InvalidKey(format!("line {}: {}", n + 1, line))
                })?;
                recipients.push(recipient);
            }
        }

        trace!(
            identities = identities.len(),
            recipients = recipients.len(),
            "key ring parsed"
        );

        Ok(Self {
            identities,
            recipients,
        })
    }
}

impl Codec for Age {
    fn name(&self) -> &'static str {
        "age"
    }

    fn encode(&self, plaintext: &[u8], keys: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
        let ring = KeyRing::read(keys)?;
        if ring.recipients.is_empty() {
            return Err(CodecError::NoRecipients);
        }

        trace!(
            recipients = ring.recipients.len(),
            plaintext_len = plaintext.len(),
            "encoding"
        );

        let encryptor = age::Encryptor::with_recipients(
            ring.recipients.iter().map(|r| r as &dyn age::Recipient),
        )
        .map_err(|e| CodecError::EncodeError(e.to_string()))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(age::armor::ArmoredWriter::wrap_output(
                &mut encrypted,
                age::armor::Format::AsciiArmor,
            )?)
            .map_err(|e| CodecError::EncodeError(e.to_string()))?;

        writer.write_all(plaintext)?;
        let armored = writer
            .finish()
            .map_err(|e| CodecError::EncodeError(e.to_string()))?;
        armored
            .finish()
            .map_err(|e| CodecError::EncodeError(format!("armor: {}", e)))?;

        trace!(ciphertext_len = encrypted.len(), "encoded");
        Ok(encrypted)
    }

    fn decode(&self, ciphertext: &[u8], keys: &mut dyn Read) -> Result<Vec<u8>, CodecError> {
        let ring = KeyRing::read(keys)?;
        if ring.identities.is_empty() {
            return Err(CodecError::NoIdentities);
        }

        trace!(ciphertext_len = ciphertext.len(), "decoding");

        let reader = age::armor::ArmoredReader::new(ciphertext);
        let decryptor =
            age::Decryptor::new(reader).map_err(|e| CodecError::DecodeError(e.to_string()))?;

        let mut reader = decryptor
            .decrypt(ring.identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| CodecError::DecodeError(e.to_string()))?;

        let mut decrypted = Vec::new();
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| CodecError::DecodeError(e.to_string()))?;

        trace!(plaintext_len = decrypted.len(), "decoded");
        Ok(decrypted)
    }
}
