//! Test doubles for the deck crate
//!
//! [`MockTransport`] is a scriptable in-memory HID bus: tests attach and
//! detach devices, queue reports or errors per path, and inspect the calls
//! the library made.
//!
//! # Example
//!
//! ```
//! use common::test_utils::create_mock_listing;
//! use deck::test_utils::MockTransport;
//!
//! let bus = MockTransport::new();
//! bus.attach(create_mock_listing(1, 0x5500, 0x1001));
//! assert_eq!(bus.attached().len(), 1);
//! ```

use crate::transport::DeviceTransport;
use async_trait::async_trait;
use parking_lot::Mutex;
use protocol::{
    DeviceError, DeviceIdentity, DeviceMode, RawDeviceInfo, ReadResult, Result,
    decode_input_report, status,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Duration;

/// One scripted read outcome
#[derive(Debug, Clone)]
pub enum MockRead {
    /// Return this raw report
    Report(Vec<u8>),
    /// Fail with this error
    Error(DeviceError),
}

#[derive(Default)]
struct BusState {
    attached: Vec<RawDeviceInfo>,
    open: HashSet<String>,
    reads: HashMap<String, VecDeque<MockRead>>,
    read_delay: HashMap<String, Duration>,
    fail_open: HashSet<String>,
    fail_enumerate: bool,
    fail_list: bool,
    display_unsupported: bool,
    serial: Vec<u8>,
    calls: Vec<(&'static str, String)>,
    in_flight: usize,
}

/// Scriptable in-memory transport
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<BusState>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plug a device into the bus
    pub fn attach(&self, info: RawDeviceInfo) {
        let mut state = self.state.lock();
        state.attached.retain(|d| d.identity.path != info.identity.path);
        state.attached.push(info);
    }

    /// Unplug the device at `path`
    pub fn detach(&self, path: &str) {
        let mut state = self.state.lock();
        state.attached.retain(|d| d.identity.path != path);
        state.open.remove(path);
    }

    /// Current bus contents
    pub fn attached(&self) -> Vec<RawDeviceInfo> {
        self.state.lock().attached.clone()
    }

    /// Queue a raw report for `path`
    pub fn push_report(&self, path: &str, report: Vec<u8>) {
        self.push_read(path, MockRead::Report(report));
    }

    /// Queue a read failure for `path`
    pub fn push_read_error(&self, path: &str, error: DeviceError) {
        self.push_read(path, MockRead::Error(error));
    }

    pub fn push_read(&self, path: &str, read: MockRead) {
        self.state
            .lock()
            .reads
            .entry(path.to_string())
            .or_default()
            .push_back(read);
    }

    /// Make every read on `path` take at least `delay`
    pub fn set_read_delay(&self, path: &str, delay: Duration) {
        self.state.lock().read_delay.insert(path.to_string(), delay);
    }

    /// Make `open(path)` fail
    pub fn fail_open(&self, path: &str) {
        self.state.lock().fail_open.insert(path.to_string());
    }

    /// Make `enumerate` fail until reset
    pub fn set_fail_enumerate(&self, fail: bool) {
        self.state.lock().fail_enumerate = fail;
    }

    /// Make `list_devices` fail until reset
    pub fn set_fail_list(&self, fail: bool) {
        self.state.lock().fail_list = fail;
    }

    /// Make every display/control command fail with `NotSupported`, the way
    /// a backend without the vendor command set behaves
    pub fn set_display_unsupported(&self, unsupported: bool) {
        self.state.lock().display_unsupported = unsupported;
    }

    /// Bytes returned by `get_input_report`
    pub fn set_serial(&self, serial: &[u8]) {
        self.state.lock().serial = serial.to_vec();
    }

    /// Every recorded call as `(operation, path)`
    pub fn calls(&self) -> Vec<(&'static str, String)> {
        self.state.lock().calls.clone()
    }

    /// Recorded operations against one path, in order
    pub fn calls_for(&self, path: &str) -> Vec<&'static str> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(_, p)| p == path)
            .map(|(op, _)| *op)
            .collect()
    }

    /// How many times `op` was called for `path`
    pub fn count(&self, op: &str, path: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|(o, p)| *o == op && p == path)
            .count()
    }

    /// Reads completed against `path`
    pub fn read_count(&self, path: &str) -> usize {
        self.count("read_end", path)
    }

    /// Reads currently in progress across all paths
    pub fn reads_in_flight(&self) -> usize {
        self.state.lock().in_flight
    }

    pub fn is_open(&self, path: &str) -> bool {
        self.state.lock().open.contains(path)
    }

    fn record(&self, op: &'static str, path: &str) {
        self.state.lock().calls.push((op, path.to_string()));
    }

    fn status_call(&self, op: &'static str, path: &str) -> Result<i32> {
        let mut state = self.state.lock();
        state.calls.push((op, path.to_string()));
        if state.display_unsupported {
            return Err(DeviceError::NotSupported(op.to_string()));
        }
        Ok(status::SUCCESS)
    }
}

#[async_trait]
impl DeviceTransport for MockTransport {
    async fn list_devices(&self) -> Result<Vec<RawDeviceInfo>> {
        let state = self.state.lock();
        if state.fail_list {
            return Err(DeviceError::failed("listing failed"));
        }
        Ok(state.attached.clone())
    }

    async fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
        let state = self.state.lock();
        if state.fail_enumerate {
            return Err(DeviceError::Connection("enumerate failed".into()));
        }
        Ok(state
            .attached
            .iter()
            .filter(|d| d.identity.family_key() == (vendor_id, product_id))
            .map(|d| d.identity.clone())
            .collect())
    }

    async fn open(&self, path: &str) -> Result<()> {
        self.record("open", path);
        let mut state = self.state.lock();
        if state.fail_open.contains(path) {
            return Err(DeviceError::Connection(format!("cannot open {}", path)));
        }
        if !state.attached.iter().any(|d| d.identity.path == path) {
            return Err(DeviceError::NotFound(path.to_string()));
        }
        state.open.insert(path.to_string());
        Ok(())
    }

    async fn close(&self, path: &str) -> Result<()> {
        self.record("close", path);
        if self.state.lock().open.remove(path) {
            Ok(())
        } else {
            Err(DeviceError::NotOpen(path.to_string()))
        }
    }

    async fn read(&self, path: &str, _length: Option<usize>) -> Result<ReadResult> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push(("read_start", path.to_string()));
            state.in_flight += 1;
            state.read_delay.get(path).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.in_flight -= 1;
        state.calls.push(("read_end", path.to_string()));

        if !state.open.contains(path) {
            return Err(DeviceError::NotOpen(path.to_string()));
        }
        match state.reads.get_mut(path).and_then(|q| q.pop_front()) {
            Some(MockRead::Report(raw)) => Ok(decode_input_report(&raw)),
            Some(MockRead::Error(e)) => Err(e),
            // Nothing queued behaves like a read timeout
            None => Ok(ReadResult::default()),
        }
    }

    async fn write(&self, path: &str, data: &[u8], length: usize) -> Result<usize> {
        self.record("write", path);
        Ok(length.min(data.len()))
    }

    async fn set_brightness(&self, path: &str, _percent: u8) -> Result<i32> {
        self.status_call("set_brightness", path)
    }

    async fn wake_screen(&self, path: &str) -> Result<i32> {
        self.status_call("wake_screen", path)
    }

    async fn refresh(&self, path: &str) -> Result<i32> {
        self.status_call("refresh", path)
    }

    async fn switch_mode(&self, path: &str, _mode: DeviceMode) -> Result<i32> {
        self.status_call("switch_mode", path)
    }

    async fn set_background_img(&self, path: &str, _data: &[u8], _size: usize) -> Result<i32> {
        self.status_call("set_background_img", path)
    }

    async fn set_background_img_dual_device(&self, path: &str, image: &Path) -> Result<i32> {
        if !image.exists() {
            return Err(DeviceError::failed(format!("{} missing", image.display())));
        }
        self.status_call("set_background_img_dual_device", path)
    }

    async fn set_key_img(&self, path: &str, _image: &Path, _key: u8) -> Result<i32> {
        self.status_call("set_key_img", path)
    }

    async fn set_key_img_dual_device(&self, path: &str, image: &Path, _key: u8) -> Result<i32> {
        if !image.exists() {
            return Err(DeviceError::failed(format!("{} missing", image.display())));
        }
        self.status_call("set_key_img_dual_device", path)
    }

    async fn set_key_img_data_dual_device(
        &self,
        path: &str,
        image: &Path,
        _key: u8,
    ) -> Result<i32> {
        if !image.exists() {
            return Err(DeviceError::failed(format!("{} missing", image.display())));
        }
        self.status_call("set_key_img_data_dual_device", path)
    }

    async fn key_clear(&self, path: &str, _index: u8) -> Result<i32> {
        self.status_call("key_clear", path)
    }

    async fn key_all_clear(&self, path: &str) -> Result<i32> {
        self.status_call("key_all_clear", path)
    }

    async fn get_input_report(&self, path: &str, length: usize) -> Result<Vec<u8>> {
        self.record("get_input_report", path);
        let mut report = self.state.lock().serial.clone();
        report.resize(length, 0);
        Ok(report)
    }

    async fn disconnected(&self, path: &str) -> Result<i32> {
        self.status_call("disconnected", path)
    }
}
