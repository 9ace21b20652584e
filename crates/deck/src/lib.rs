//! Deck lifecycle management
//!
//! Discovers HID decks, tracks attach/detach by polling, and runs one key
//! read loop per open device.
//!
//! # Example
//!
//! ```no_run
//! use deck::{DeviceManager, ListenOptions, MonitorEvent};
//! use deck::test_utils::MockTransport;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = DeviceManager::new(Arc::new(MockTransport::new()));
//! let monitor = manager
//!     .listen(ListenOptions { emit_existing: true, ..Default::default() })
//!     .await;
//!
//! let events = monitor.subscribe();
//! while let Ok(event) = events.recv().await {
//!     if let MonitorEvent::Added(deck) = event {
//!         deck.set_key_callback(|deck, key, state| {
//!             println!("{} key {} -> {}", deck.path(), key, state);
//!         })
//!         .await?;
//!     }
//! }
//! monitor.close().await;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod device;
pub mod error;
pub mod image;
pub mod manager;
pub mod monitor;
pub mod read_loop;
pub mod registry;
pub mod test_utils;
pub mod transport;

pub use catalog::{BUILTIN_PRODUCTS, CatalogEntry, DeviceFamily, DiscoveryCatalog, UnknownFamily};
pub use crate::image::{ImageProcessor, ImageRsProcessor, ProcessedImage};
pub use device::{DeviceHandle, DualDisplayDeck, SupportsDualDisplayImaging};
pub use error::{DeckError, Result};
pub use manager::DeviceManager;
pub use monitor::{HotplugMonitor, ListenOptions, MonitorEvent};
pub use read_loop::{KeyCallback, LoopState};
pub use registry::DeviceRegistry;
pub use transport::DeviceTransport;

#[cfg(feature = "hid")]
pub use transport::HidTransport;
