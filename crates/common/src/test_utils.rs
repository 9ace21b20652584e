//! Test utilities for stream-deck-rs
//!
//! Provides fixture builders and helper functions for testing across crates.
//!
//! # Example
//!
//! ```
//! use common::test_utils::{create_mock_identity, create_mock_report};
//!
//! let id = create_mock_identity(1, 0x6603, 0x1002);
//! assert_eq!(id.vendor_id, 0x6603);
//!
//! let report = create_mock_report(3, 1);
//! assert_eq!(report[9], 3);
//! ```

use protocol::{DEFAULT_READ_LENGTH, DeviceIdentity, RawDeviceInfo};
use std::future::Future;
use std::time::Duration;

/// Default test timeout (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Usage page reported by deck vendor interfaces in fixtures
pub const MOCK_VENDOR_USAGE_PAGE: u16 = 0xFFA0;

/// Create a mock identity with a unique hidraw-style path
///
/// # Example
/// ```
/// use common::test_utils::create_mock_identity;
///
/// let id = create_mock_identity(4, 0x5500, 0x1001);
/// assert_eq!(id.path, "/dev/hidraw4");
/// ```
pub fn create_mock_identity(id: u32, vendor_id: u16, product_id: u16) -> DeviceIdentity {
    DeviceIdentity::new(vendor_id, product_id, format!("/dev/hidraw{}", id))
}

/// Create a listing entry for a deck's vendor interface
pub fn create_mock_listing(id: u32, vendor_id: u16, product_id: u16) -> RawDeviceInfo {
    RawDeviceInfo::new(
        create_mock_identity(id, vendor_id, product_id),
        Some(MOCK_VENDOR_USAGE_PAGE),
    )
}

/// Create a listing entry for a non-vendor interface (keyboard usage page)
pub fn create_mock_keyboard_listing(id: u32, vendor_id: u16, product_id: u16) -> RawDeviceInfo {
    RawDeviceInfo::new(create_mock_identity(id, vendor_id, product_id), Some(0x0001))
}

/// Create a full-length raw input report for a physical key
pub fn create_mock_report(key: u8, state: u8) -> Vec<u8> {
    let mut buf = vec![0u8; DEFAULT_READ_LENGTH];
    buf[..3].copy_from_slice(b"ACK");
    buf[5..7].copy_from_slice(b"OK");
    buf[9] = key;
    buf[10] = state;
    buf
}

/// Timeout wrapper for async tests
///
/// Wraps an async operation with a timeout to prevent tests from hanging.
///
/// # Example
/// ```ignore
/// use common::test_utils::{with_timeout, DEFAULT_TEST_TIMEOUT};
///
/// #[tokio::test]
/// async fn test_with_timeout() {
///     let event = with_timeout(DEFAULT_TEST_TIMEOUT, sub.recv()).await.unwrap();
/// }
/// ```
pub async fn with_timeout<T, F>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, future)
        .await
        .map_err(|_| TimeoutError { duration })
}

/// Poll `condition` every few milliseconds until it holds or `duration` passes
///
/// Returns whether the condition held in time.
pub async fn wait_until<F>(duration: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + duration;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Error returned when a test times out
#[derive(Debug)]
pub struct TimeoutError {
    /// The timeout duration that was exceeded
    pub duration: Duration,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Test timed out after {:?}", self.duration)
    }
}

impl std::error::Error for TimeoutError {}
