//! Common utilities for stream-deck-rs
//!
//! This crate provides shared functionality between the lifecycle library and
//! the daemon, including logging setup, ambient error handling, the fan-out
//! event channel used for hotplug notifications, and test helpers.

pub mod channel;
pub mod error;
pub mod logging;
pub mod test_utils;

pub use channel::{EventHub, HubGuard, Subscription};
pub use error::{Error, Result};
pub use logging::setup_logging;
