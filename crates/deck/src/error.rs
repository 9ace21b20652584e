//! Library error types

use protocol::DeviceError;
use thiserror::Error;

/// Errors surfaced by the lifecycle manager
#[derive(Debug, Error)]
pub enum DeckError {
    /// Transport failure
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A handle with this path is already registered
    #[error("Device path already registered: {0}")]
    DuplicatePath(String),

    /// Image source missing or processing failed
    #[error("Image unavailable: {0}")]
    ImageUnavailable(String),

    /// The monitor has been closed
    #[error("Monitor is closed")]
    MonitorClosed,
}

impl DeckError {
    /// Numeric status code, matching the transport status table
    pub fn code(&self) -> i32 {
        match self {
            DeckError::Device(e) => e.code(),
            DeckError::DuplicatePath(_) => protocol::status::INVALID_PARAM,
            DeckError::ImageUnavailable(_) | DeckError::MonitorClosed => protocol::status::ERROR,
        }
    }
}

/// Type alias for library results
pub type Result<T> = std::result::Result<T, DeckError>;
