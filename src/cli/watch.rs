//! Watch command.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::output;
use crate::core::config::Settings;
use crate::core::manager::ConfigManager;
use crate::error::Result;

/// Print the value at `key` now and after every change until Ctrl-C.
///
/// Failures are reported as they happen; the watch keeps retrying.
pub async fn execute(settings: &Settings, key: &str) -> Result<()> {
    let manager = ConfigManager::open(settings, &settings.secret_keyring)?;
    let cancel = CancellationToken::new();
    let mut watch = manager.watch(key, &cancel);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!(key, "interrupted");
                cancel.cancel();
                break;
            }
            item = watch.recv() => match item {
                Some(Ok(value)) => output::value(&value)?,
                Some(Err(e)) => output::error(&e.to_string()),
                None => break,
            },
        }
    }

    watch.stopped().await;
    Ok(())
}
