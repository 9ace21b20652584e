//! Ambient error types for logging setup and event delivery

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Subscription closed or event delivery failed
    #[error("Channel error: {0}")]
    Channel(String),

    /// Invalid logging or filter configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
