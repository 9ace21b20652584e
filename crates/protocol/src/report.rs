//! Input report decoding
//!
//! Raw input reports are 13 bytes by default:
//!
//! ```text
//! 0..4   ack marker (NUL-terminated ASCII, "ACK")
//! 5..7   ok marker (NUL-terminated ASCII, "OK")
//! 9      key index in device layout numbering
//! 10     key state
//! ```
//!
//! Key 255 marks the acknowledgement of a write rather than a key event.

use crate::types::ReadResult;

/// Default length requested from the transport per read
pub const DEFAULT_READ_LENGTH: usize = 13;

/// Reports shorter than this are partial or noise frames
pub const MIN_FRAME_LEN: usize = 10;

/// Key value marking a write acknowledgement
pub const ACK_KEY: u8 = 255;

const KEY_OFFSET: usize = 9;
const STATUS_OFFSET: usize = 10;

/// Decode a raw report into a [`ReadResult`]
///
/// Missing bytes decode as zero; the caller decides whether the frame is long
/// enough to act on (see [`is_key_frame`]).
pub fn decode_input_report(buffer: &[u8]) -> ReadResult {
    ReadResult {
        key: buffer.get(KEY_OFFSET).copied().unwrap_or(0),
        status: buffer.get(STATUS_OFFSET).copied().unwrap_or(0),
        buffer: buffer.to_vec(),
        ack_response: c_string(slice(buffer, 0, 4)),
        ok_response: c_string(slice(buffer, 5, 7)),
    }
}

/// What a decoded report means to the read loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// Partial/noise frame, discarded
    Short,
    /// Write acknowledgement, not a key event
    WriteAck,
    /// Key event carrying the logical key and its state
    Key { key: u8, status: u8 },
}

/// Classify a decoded report, remapping the key for key events
pub fn classify(result: &ReadResult) -> ReportKind {
    if result.buffer.len() < MIN_FRAME_LEN {
        ReportKind::Short
    } else if result.key == ACK_KEY {
        ReportKind::WriteAck
    } else {
        ReportKind::Key {
            key: map_key(result.key),
            status: result.status,
        }
    }
}

/// Whether a report is long enough to carry a key event
pub fn is_key_frame(result: &ReadResult) -> bool {
    matches!(classify(result), ReportKind::Key { .. })
}

/// Remap a physical key index to logical numbering
///
/// The top and bottom rows of the 15-key layout are swapped; the middle row is
/// unchanged. Values outside 1..=15 pass through untouched.
pub fn map_key(raw: u8) -> u8 {
    match raw {
        1..=5 => raw + 10,
        6..=10 => raw,
        11..=15 => raw - 10,
        other => other,
    }
}

fn slice(buffer: &[u8], start: usize, end: usize) -> &[u8] {
    let end = end.min(buffer.len());
    let start = start.min(end);
    &buffer[start..end]
}

fn c_string(bytes: &[u8]) -> String {
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..len]).into_owned()
}
