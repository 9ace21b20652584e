//! Per-deck setup shared by the hotplug and one-shot modes

use anyhow::{Context, Result};
use deck::DeviceHandle;
use tracing::{info, warn};

/// Open a deck, optionally initialise it and start its read loop
///
/// Initialisation is best-effort: backends without the vendor display
/// commands still deliver key events.
pub async fn attach<F>(deck: &DeviceHandle, init_on_attach: bool, on_key: F) -> Result<()>
where
    F: Fn(&DeviceHandle, u8, u8) + Send + Sync + 'static,
{
    deck.open().await.context("open failed")?;

    if init_on_attach && let Err(e) = deck.init().await {
        warn!("Skipping init for {}: {}", deck.identity(), e);
    }

    deck.set_key_callback(on_key)
        .await
        .context("failed to start read loop")?;

    Ok(())
}

/// Key callback that logs every press and release
pub fn log_key(deck: &DeviceHandle, key: u8, state: u8) {
    let action = if state == 0 { "released" } else { "pressed" };
    info!("Key {} {} on {}", key, action, deck.path());
}
