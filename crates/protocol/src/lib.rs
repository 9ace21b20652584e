//! Protocol library for stream-deck-rs
//!
//! This crate defines the host-side data model shared by the transport
//! backends and the device lifecycle manager: device identities, OS listing
//! entries, decoded input reports, firmware modes, status codes and the
//! transport error taxonomy.
//!
//! # Example
//!
//! ```
//! use protocol::{classify, decode_input_report, ReportKind};
//!
//! let mut raw = [0u8; 13];
//! raw[9] = 1; // physical key 1
//! raw[10] = 1; // pressed
//!
//! let report = decode_input_report(&raw);
//! assert_eq!(classify(&report), ReportKind::Key { key: 11, status: 1 });
//! ```

pub mod error;
pub mod report;
pub mod types;

pub use error::{DeviceError, Result};
pub use report::{
    ACK_KEY, DEFAULT_READ_LENGTH, MIN_FRAME_LEN, ReportKind, classify, decode_input_report,
    is_key_frame, map_key,
};
pub use types::{
    DeviceIdentity, DeviceMode, ImageFormat, RawDeviceInfo, ReadResult, VENDOR_USAGE_PAGE_MIN,
    status,
};
