//! deckd
//!
//! Host daemon for HID stream-deck style controllers. Tracks decks as they
//! are plugged in and removed, initialises each one and logs key events.

use anyhow::{Context, Result};
use clap::Parser;
use common::setup_logging;
use deck::{DeviceHandle, DeviceManager, DeviceTransport, MonitorEvent};
use deckd::{DaemonConfig, session};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "deckd")]
#[command(author, version, about = "deckd - Stream deck lifecycle daemon")]
#[command(long_about = "
Discovers supported stream deck devices, follows them through hotplug
events and logs every key press.

EXAMPLES:
    # Run with default config
    deckd

    # Run with custom config
    deckd --config /path/to/deckd.toml

    # List attached decks and exit
    deckd --list-devices

    # Open the decks attached right now and ignore later hotplug events
    deckd --once

    # Run with debug logging
    deckd --log-level debug

CONFIGURATION:
    The daemon looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/stream-deck-rs/deckd.toml
    3. /etc/stream-deck-rs/deckd.toml
    4. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// List attached decks and exit
    #[arg(long)]
    list_devices: bool,

    /// Enumerate once, open every deck and wait for Ctrl+C
    #[arg(long)]
    once: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = DaemonConfig::default();
        let path = DaemonConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        deckd::config::load_config(path).context("Failed to load configuration")?
    } else {
        DaemonConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .as_deref()
        .unwrap_or(&config.daemon.log_level);

    setup_logging(log_level).context("Failed to setup logging")?;

    info!("deckd v{}", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", log_level);

    let catalog = config.catalog().context("Invalid catalog configuration")?;
    let manager = DeviceManager::with_catalog(transport()?, catalog);

    if args.list_devices {
        return list_devices_mode(&manager).await;
    }

    if args.once {
        run_once(&manager, &config).await
    } else {
        run_monitor(&manager, &config).await
    }
}

#[cfg(feature = "hid")]
fn transport() -> Result<Arc<dyn DeviceTransport>> {
    let transport = deck::HidTransport::new().context("Failed to initialise HID backend")?;
    Ok(Arc::new(transport))
}

#[cfg(not(feature = "hid"))]
fn transport() -> Result<Arc<dyn DeviceTransport>> {
    Err(anyhow::anyhow!(
        "No HID backend compiled in, rebuild with `--features hid`"
    ))
}

/// List attached decks and exit
async fn list_devices_mode(manager: &DeviceManager) -> Result<()> {
    let decks = manager
        .enumerate()
        .await
        .context("Failed to enumerate decks")?;

    if decks.is_empty() {
        println!("No decks found.");
    } else {
        println!("Found {} deck(s):\n", decks.len());
        for deck in decks {
            let id = deck.identity();
            println!(
                "  {:04x}:{:04x} - {} ({})",
                id.vendor_id,
                id.product_id,
                deck.family(),
                id.path
            );
        }
    }

    Ok(())
}

/// Open the decks attached at startup and serve them until Ctrl+C
async fn run_once(manager: &DeviceManager, config: &DaemonConfig) -> Result<()> {
    let decks = manager
        .enumerate()
        .await
        .context("Failed to enumerate decks")?;
    info!("Found {} deck(s)", decks.len());

    for deck in &decks {
        if let Err(e) = attach(deck, config).await {
            error!("Failed to set up deck {}: {:#}", deck.identity(), e);
        }
    }

    wait_for_shutdown().await;

    for deck in &decks {
        deck.close().await;
    }

    info!("deckd shutdown complete");
    Ok(())
}

/// Follow hotplug events until Ctrl+C
async fn run_monitor(manager: &DeviceManager, config: &DaemonConfig) -> Result<()> {
    let monitor = manager.listen(config.listen_options()).await;
    let events = monitor.subscribe();

    info!("Press Ctrl+C to shutdown");

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                match result {
                    Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
                    Err(e) => error!("Error waiting for Ctrl+C: {}", e),
                }
                break;
            }
            event = events.recv() => {
                match event {
                    Ok(MonitorEvent::Added(deck)) => {
                        info!("Deck added: {} ({})", deck.identity(), deck.family());
                        if let Err(e) = attach(&deck, config).await {
                            error!("Failed to set up deck {}: {:#}", deck.identity(), e);
                        }
                    }
                    Ok(MonitorEvent::Removed(deck)) => {
                        info!("Deck removed: {}", deck.identity());
                    }
                    Err(e) => {
                        warn!("Event stream ended: {}", e);
                        break;
                    }
                }
            }
        }
    }

    monitor.close().await;
    info!("deckd shutdown complete");
    Ok(())
}

async fn attach(deck: &DeviceHandle, config: &DaemonConfig) -> Result<()> {
    session::attach(deck, config.daemon.init_on_attach, session::log_key).await
}

async fn wait_for_shutdown() {
    info!("Press Ctrl+C to shutdown");
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down gracefully..."),
        Err(e) => error!("Error waiting for Ctrl+C: {}", e),
    }
}
