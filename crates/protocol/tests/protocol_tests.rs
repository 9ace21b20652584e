//! Integration tests for input report decoding and the device data model
//!
//! Covers the behaviours the read loop depends on: frame length gating,
//! write-acknowledgement detection and the key layout remap.

use protocol::{
    ACK_KEY, DEFAULT_READ_LENGTH, DeviceError, DeviceIdentity, DeviceMode, ImageFormat,
    MIN_FRAME_LEN, RawDeviceInfo, ReportKind, classify, decode_input_report, map_key, status,
};

fn make_report(key: u8, state: u8) -> Vec<u8> {
    let mut buf = vec![0u8; DEFAULT_READ_LENGTH];
    buf[..3].copy_from_slice(b"ACK");
    buf[5..7].copy_from_slice(b"OK");
    buf[9] = key;
    buf[10] = state;
    buf
}

mod report_decoding {
    use super::*;

    #[test]
    fn test_every_layout_key_is_remapped() {
        let expected = [11u8, 12, 13, 14, 15, 6, 7, 8, 9, 10, 1, 2, 3, 4, 5];
        for (raw, want) in (1..=15u8).zip(expected) {
            let report = decode_input_report(&make_report(raw, 1));
            assert_eq!(
                classify(&report),
                ReportKind::Key {
                    key: want,
                    status: 1
                },
                "raw key {}",
                raw
            );
        }
    }

    #[test]
    fn test_unmapped_keys_pass_through() {
        assert_eq!(map_key(16), 16);
        assert_eq!(map_key(99), 99);
        assert_eq!(map_key(254), 254);
    }

    #[test]
    fn test_minimum_frame_is_accepted() {
        let mut buf = make_report(7, 0);
        buf.truncate(MIN_FRAME_LEN);
        // Byte 10 is gone, so the state decodes as released
        let report = decode_input_report(&buf);
        assert_eq!(classify(&report), ReportKind::Key { key: 7, status: 0 });
    }

    #[test]
    fn test_empty_frame_is_short() {
        let report = decode_input_report(&[]);
        assert_eq!(classify(&report), ReportKind::Short);
        assert!(report.ack_response.is_empty());
    }

    #[test]
    fn test_sentinel_never_becomes_key_event() {
        for state in 0..=u8::MAX {
            let report = decode_input_report(&make_report(ACK_KEY, state));
            assert_eq!(classify(&report), ReportKind::WriteAck);
        }
    }

    #[test]
    fn test_markers_stop_at_nul() {
        let mut buf = make_report(1, 1);
        buf[0..4].copy_from_slice(b"AC\0K");
        let report = decode_input_report(&buf);
        assert_eq!(report.ack_response, "AC");
        assert_eq!(report.ok_response, "OK");
    }
}

mod data_model {
    use super::*;

    #[test]
    fn test_identity_family_key() {
        let id = DeviceIdentity::new(0x5500, 0x1001, "A");
        assert_eq!(id.family_key(), (0x5500, 0x1001));
    }

    #[test]
    fn test_listing_filter_by_usage_page() {
        let id = DeviceIdentity::new(0x6603, 0x1002, "/dev/hidraw0");
        let keyboard = RawDeviceInfo::new(id.clone(), Some(0x0001));
        let vendor = RawDeviceInfo::new(id, Some(0xFFA0));
        assert!(!keyboard.is_vendor_interface());
        assert!(vendor.is_vendor_interface());
    }

    #[test]
    fn test_mode_serde_names() {
        let mode: DeviceMode = parse_mode("bootloader");
        assert_eq!(mode, DeviceMode::Bootloader);
    }

    #[test]
    fn test_error_code_matches_status_table() {
        assert_eq!(
            DeviceError::NotSupported("set_key_img".into()).code(),
            status::NOT_SUPPORTED
        );
        assert_eq!(DeviceError::NotOpen("/dev/x".into()).code(), status::NOT_CONNECTED);
    }

    #[test]
    fn test_touchscreen_format() {
        let format = ImageFormat::jpeg((320, 240), 90);
        assert_eq!(format.format, "JPEG");
        assert_eq!(format.size, (320, 240));
        assert_eq!(format.flip, (false, false));
    }

    fn parse_mode(name: &str) -> DeviceMode {
        use serde::Deserialize;
        use serde::de::IntoDeserializer;
        use serde::de::value::{Error, StrDeserializer};

        let de: StrDeserializer<'_, Error> = name.into_deserializer();
        DeviceMode::deserialize(de).expect("known mode name")
    }
}
