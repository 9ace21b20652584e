//! Device error types

use crate::types::status;
use thiserror::Error;

/// Errors reported by a transport backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    /// Enumerate/open found nothing
    #[error("Device not found: {0}")]
    NotFound(String),

    /// Open or transport-level connection failure
    #[error("Failed to connect to device: {0}")]
    Connection(String),

    /// Operation issued against a device that is not open
    #[error("Device is not open: {0}")]
    NotOpen(String),

    /// Operation the backend cannot perform
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Any other transport failure, including read/write faults
    #[error("Device error {code}: {message}")]
    Status { code: i32, message: String },
}

impl DeviceError {
    /// Generic failure with the `ERROR` status code
    pub fn failed(message: impl Into<String>) -> Self {
        DeviceError::Status {
            code: status::ERROR,
            message: message.into(),
        }
    }

    /// Numeric status code for this error
    pub fn code(&self) -> i32 {
        match self {
            DeviceError::NotFound(_) => -1,
            DeviceError::Connection(_) => -2,
            DeviceError::NotOpen(_) => status::NOT_CONNECTED,
            DeviceError::NotSupported(_) => status::NOT_SUPPORTED,
            DeviceError::Status { code, .. } => *code,
        }
    }
}

/// Type alias for transport results
pub type Result<T> = std::result::Result<T, DeviceError>;
