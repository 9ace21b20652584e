//! deckd library surface
//!
//! The binary lives in `main.rs`; configuration and per-deck setup are
//! exposed here so they can be exercised from integration tests.

pub mod config;
pub mod session;

pub use config::DaemonConfig;
