//! Value commands (get, set, list).

use std::path::Path;

use tracing::debug;

use super::output;
use crate::core::config::Settings;
use crate::core::manager::ConfigManager;
use crate::core::store::Store;
use crate::error::Result;

/// Print the decrypted value at `key`.
pub async fn get(settings: &Settings, key: &str) -> Result<()> {
    let manager = ConfigManager::open(settings, &settings.secret_keyring)?;
    let value = manager.get(key).await?;
    output::value(&value)?;
    Ok(())
}

/// Encrypt the contents of `data` and store them at `key`.
pub async fn set(settings: &Settings, key: &str, data: &Path) -> Result<()> {
    let manager = ConfigManager::open(settings, &settings.keyring)?;
    let value = std::fs::read(data)?;
    debug!(key, path = %data.display(), len = value.len(), "storing value");
    manager.set(key, &value).await?;
    Ok(())
}

/// Print the leaf keys directly under `key`.
///
/// Listings are stored in the clear, so no key ring is needed.
pub async fn list(settings: &Settings, key: &str) -> Result<()> {
    let store = Store::from_arc(settings.driver()?);
    let keys = store.list(key).await?;
    if keys.is_empty() {
        output::dimmed(&format!("no values under {}", output::key(key)));
    }
    for k in keys {
        output::value(k.as_bytes())?;
    }
    Ok(())
}
