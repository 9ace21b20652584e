//! Transport abstraction
//!
//! A [`DeviceTransport`] performs the actual USB/HID I/O for every deck a
//! manager tracks. One instance is shared by all handles, so every device
//! operation is addressed by the OS device path; backends must keep state for
//! different paths independent and may serialise calls for the same path.

#[cfg(feature = "hid")]
mod hid;

#[cfg(feature = "hid")]
pub use hid::HidTransport;

use async_trait::async_trait;
use protocol::{DeviceIdentity, DeviceMode, RawDeviceInfo, ReadResult, Result};
use std::path::Path;

/// Native I/O backend shared by all deck handles
///
/// Status-returning operations yield the backend's numeric status code
/// (see [`protocol::status`]); failures are reported as
/// [`protocol::DeviceError`].
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// OS-wide listing of HID interfaces, used by the hotplug attach pass
    async fn list_devices(&self) -> Result<Vec<RawDeviceInfo>>;

    /// Attached devices with the given vendor/product pair
    async fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>>;

    /// Open the device at `path`
    async fn open(&self, path: &str) -> Result<()>;

    /// Close the device at `path`
    async fn close(&self, path: &str) -> Result<()>;

    /// Read one input report
    ///
    /// `length` defaults to [`protocol::DEFAULT_READ_LENGTH`]. Backends should
    /// bound how long a single read may block.
    async fn read(&self, path: &str, length: Option<usize>) -> Result<ReadResult>;

    /// Write raw bytes, returning the number written
    async fn write(&self, path: &str, data: &[u8], length: usize) -> Result<usize>;

    /// Set display brightness (0-100)
    async fn set_brightness(&self, path: &str, percent: u8) -> Result<i32>;

    /// Wake the display from standby
    async fn wake_screen(&self, path: &str) -> Result<i32>;

    /// Commit pending display changes
    async fn refresh(&self, path: &str) -> Result<i32>;

    /// Switch the firmware operating mode
    async fn switch_mode(&self, path: &str, mode: DeviceMode) -> Result<i32>;

    /// Upload a pre-encoded background image
    async fn set_background_img(&self, path: &str, data: &[u8], size: usize) -> Result<i32>;

    /// Upload the touchscreen background of a dual-display deck from a file
    async fn set_background_img_dual_device(&self, path: &str, image: &Path) -> Result<i32>;

    /// Upload a key image from a file
    async fn set_key_img(&self, path: &str, image: &Path, key: u8) -> Result<i32>;

    /// Upload a key image from a file on a dual-display deck
    async fn set_key_img_dual_device(&self, path: &str, image: &Path, key: u8) -> Result<i32>;

    /// Upload raw key image data from a file on a dual-display deck
    async fn set_key_img_data_dual_device(&self, path: &str, image: &Path, key: u8)
    -> Result<i32>;

    /// Clear the image of one key
    async fn key_clear(&self, path: &str, index: u8) -> Result<i32>;

    /// Clear every key image
    async fn key_all_clear(&self, path: &str) -> Result<i32>;

    /// Fetch an input report of `length` bytes
    async fn get_input_report(&self, path: &str, length: usize) -> Result<Vec<u8>>;

    /// Tell the device the host is going away
    async fn disconnected(&self, path: &str) -> Result<i32>;
}
