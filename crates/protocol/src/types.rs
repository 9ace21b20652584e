//! Deck data model
//!
//! This module defines the identity, listing and input-report types shared by
//! the transport backends and the lifecycle manager, along with the numeric
//! status codes the native transport reports.

use serde::{Deserialize, Serialize};
use std::fmt;

/// First usage page in the vendor-defined HID range
pub const VENDOR_USAGE_PAGE_MIN: u16 = 0xFF00;

/// Immutable identity of one attached deck
///
/// `path` is the OS-assigned handle identifier and is the uniqueness key.
/// Two identities refer to the same device iff all three fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// USB Product ID
    pub product_id: u16,
    /// OS device path
    pub path: String,
}

impl DeviceIdentity {
    /// Create a new identity
    pub fn new(vendor_id: u16, product_id: u16, path: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            path: path.into(),
        }
    }

    /// The (vendor, product) family this device belongs to
    pub fn family_key(&self) -> (u16, u16) {
        (self.vendor_id, self.product_id)
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}@{}", self.vendor_id, self.product_id, self.path)
    }
}

/// One entry of the OS-wide HID listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeviceInfo {
    /// Identity of the interface
    pub identity: DeviceIdentity,
    /// HID usage page, when the backend exposes it
    pub usage_page: Option<u16>,
}

impl RawDeviceInfo {
    /// Create a listing entry
    pub fn new(identity: DeviceIdentity, usage_page: Option<u16>) -> Self {
        Self {
            identity,
            usage_page,
        }
    }

    /// Whether this interface may be a vendor-defined HID interface
    ///
    /// Backends that cannot report a usage page are not filtered.
    pub fn is_vendor_interface(&self) -> bool {
        self.usage_page.is_none_or(|page| page >= VENDOR_USAGE_PAGE_MIN)
    }
}

/// Decoded input report
///
/// Produced by every poll of the read loop and consumed immediately.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadResult {
    /// Raw key index (device layout numbering)
    pub key: u8,
    /// Key state byte
    pub status: u8,
    /// Full report as read from the device
    pub buffer: Vec<u8>,
    /// Acknowledgement marker (bytes 0..4)
    pub ack_response: String,
    /// OK marker (bytes 5..7)
    pub ok_response: String,
}

/// Operating mode of the deck firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    /// Normal key/display operation
    #[default]
    Normal,
    /// Configuration mode
    Configuration,
    /// Firmware bootloader
    Bootloader,
}

impl DeviceMode {
    /// Wire value passed to the transport
    pub fn as_raw(self) -> i32 {
        match self {
            DeviceMode::Normal => 0,
            DeviceMode::Configuration => 1,
            DeviceMode::Bootloader => 2,
        }
    }
}

impl fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMode::Normal => write!(f, "Normal"),
            DeviceMode::Configuration => write!(f, "Configuration"),
            DeviceMode::Bootloader => write!(f, "Bootloader"),
        }
    }
}

/// Status codes returned by transport operations
pub mod status {
    pub const SUCCESS: i32 = 0;
    pub const ERROR: i32 = -1;
    pub const TIMEOUT: i32 = -2;
    pub const INVALID_PARAM: i32 = -3;
    pub const NOT_SUPPORTED: i32 = -4;
    pub const NOT_CONNECTED: i32 = -5;
}

/// Target format for an image upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFormat {
    /// Output encoding name (e.g. "JPEG")
    pub format: String,
    /// Clockwise rotation in degrees (0, 90, 180 or 270)
    pub rotation: u16,
    /// Target size (width, height)
    pub size: (u32, u32),
    /// Mirror (top-to-bottom, left-to-right)
    pub flip: (bool, bool),
}

impl ImageFormat {
    /// JPEG output with the given geometry
    pub fn jpeg(size: (u32, u32), rotation: u16) -> Self {
        Self {
            format: "JPEG".to_string(),
            rotation,
            size,
            flip: (false, false),
        }
    }

    /// File extension for the output encoding
    pub fn extension(&self) -> String {
        match self.format.to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => "jpg".to_string(),
            other => other.to_string(),
        }
    }
}
