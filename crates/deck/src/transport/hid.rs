//! hidapi-backed transport
//!
//! Every blocking hidapi call runs on the tokio blocking pool. One `HidApi`
//! context is kept for the transport's lifetime and its device list is
//! refreshed before each scan. Open devices are kept per path, each behind
//! its own mutex, so I/O against different decks never contends.

use super::DeviceTransport;
use async_trait::async_trait;
use hidapi::{DeviceInfo, HidApi, HidDevice};
use parking_lot::Mutex;
use protocol::{
    DEFAULT_READ_LENGTH, DeviceError, DeviceIdentity, DeviceMode, RawDeviceInfo, ReadResult,
    Result, decode_input_report,
};
use std::collections::HashMap;
use std::ffi::{CStr, CString};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Upper bound for one blocking read
const READ_TIMEOUT_MS: i32 = 100;

type SharedDevice = Arc<Mutex<HidDevice>>;

/// Transport over the platform HID stack
pub struct HidTransport {
    api: Arc<Mutex<HidApi>>,
    devices: Mutex<HashMap<String, SharedDevice>>,
}

impl HidTransport {
    /// Initialise the HID context
    pub fn new() -> Result<Self> {
        let api = HidApi::new().map_err(|e| DeviceError::Connection(e.to_string()))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            devices: Mutex::new(HashMap::new()),
        })
    }

    fn device(&self, path: &str) -> Result<SharedDevice> {
        self.devices
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| DeviceError::NotOpen(path.to_string()))
    }

    async fn with_device<T, F>(&self, path: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&HidDevice) -> Result<T> + Send + 'static,
    {
        let device = self.device(path)?;
        blocking(move || op(&device.lock())).await
    }

    /// Refresh the device list and collect what `op` extracts from it
    async fn scan<T, F>(&self, op: F) -> Result<Vec<T>>
    where
        T: Send + 'static,
        F: Fn(&DeviceInfo) -> Option<T> + Send + 'static,
    {
        let api = self.api.clone();
        blocking(move || {
            let mut api = api.lock();
            api.refresh_devices().map_err(io_error)?;
            Ok(api.device_list().filter_map(op).collect())
        })
        .await
    }

    fn unsupported(operation: &str) -> Result<i32> {
        Err(DeviceError::NotSupported(operation.to_string()))
    }
}

async fn blocking<T, F>(op: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| DeviceError::failed(format!("HID task failed: {}", e)))?
}

fn io_error(e: hidapi::HidError) -> DeviceError {
    DeviceError::failed(e.to_string())
}

fn identity_of(info: &DeviceInfo) -> Option<DeviceIdentity> {
    identity_from(info.vendor_id(), info.product_id(), info.path())
}

/// Identity for a listed interface; `None` for paths that are not UTF-8,
/// since those could not be reopened from the stored string
fn identity_from(vendor_id: u16, product_id: u16, path: &CStr) -> Option<DeviceIdentity> {
    match path.to_str() {
        Ok(path) => Some(DeviceIdentity::new(vendor_id, product_id, path)),
        Err(_) => {
            debug!(
                "Skipping {:04x}:{:04x} with non UTF-8 path {:?}",
                vendor_id, product_id, path
            );
            None
        }
    }
}

#[async_trait]
impl DeviceTransport for HidTransport {
    async fn list_devices(&self) -> Result<Vec<RawDeviceInfo>> {
        self.scan(|info| {
            identity_of(info).map(|id| RawDeviceInfo::new(id, Some(info.usage_page())))
        })
        .await
    }

    async fn enumerate(&self, vendor_id: u16, product_id: u16) -> Result<Vec<DeviceIdentity>> {
        let found = self
            .scan(move |info| {
                (info.vendor_id() == vendor_id && info.product_id() == product_id)
                    .then(|| identity_of(info))
                    .flatten()
            })
            .await?;
        debug!(
            "Enumerated {} interfaces for {:04x}:{:04x}",
            found.len(),
            vendor_id,
            product_id
        );
        Ok(found)
    }

    async fn open(&self, path: &str) -> Result<()> {
        if self.devices.lock().contains_key(path) {
            return Ok(());
        }

        let c_path =
            CString::new(path).map_err(|_| DeviceError::NotFound(format!("invalid path {}", path)))?;
        let api = self.api.clone();
        let device = blocking(move || {
            api.lock()
                .open_path(&c_path)
                .map_err(|e| DeviceError::Connection(e.to_string()))
        })
        .await?;

        self.devices
            .lock()
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(device)));
        debug!("Opened HID device {}", path);
        Ok(())
    }

    async fn close(&self, path: &str) -> Result<()> {
        // Dropping the last reference closes the hidapi handle
        match self.devices.lock().remove(path) {
            Some(_) => {
                debug!("Closed HID device {}", path);
                Ok(())
            }
            None => Err(DeviceError::NotOpen(path.to_string())),
        }
    }

    async fn read(&self, path: &str, length: Option<usize>) -> Result<ReadResult> {
        let length = length.unwrap_or(DEFAULT_READ_LENGTH);
        self.with_device(path, move |device| {
            let mut buf = vec![0u8; length];
            let n = device
                .read_timeout(&mut buf, READ_TIMEOUT_MS)
                .map_err(io_error)?;
            Ok(decode_input_report(&buf[..n]))
        })
        .await
    }

    async fn write(&self, path: &str, data: &[u8], length: usize) -> Result<usize> {
        let payload = data[..length.min(data.len())].to_vec();
        self.with_device(path, move |device| device.write(&payload).map_err(io_error))
            .await
    }

    async fn set_brightness(&self, _path: &str, _percent: u8) -> Result<i32> {
        Self::unsupported("set_brightness")
    }

    async fn wake_screen(&self, _path: &str) -> Result<i32> {
        Self::unsupported("wake_screen")
    }

    async fn refresh(&self, _path: &str) -> Result<i32> {
        Self::unsupported("refresh")
    }

    async fn switch_mode(&self, _path: &str, _mode: DeviceMode) -> Result<i32> {
        Self::unsupported("switch_mode")
    }

    async fn set_background_img(&self, _path: &str, _data: &[u8], _size: usize) -> Result<i32> {
        Self::unsupported("set_background_img")
    }

    async fn set_background_img_dual_device(&self, _path: &str, _image: &Path) -> Result<i32> {
        Self::unsupported("set_background_img_dual_device")
    }

    async fn set_key_img(&self, _path: &str, _image: &Path, _key: u8) -> Result<i32> {
        Self::unsupported("set_key_img")
    }

    async fn set_key_img_dual_device(&self, _path: &str, _image: &Path, _key: u8) -> Result<i32> {
        Self::unsupported("set_key_img_dual_device")
    }

    async fn set_key_img_data_dual_device(
        &self,
        _path: &str,
        _image: &Path,
        _key: u8,
    ) -> Result<i32> {
        Self::unsupported("set_key_img_data_dual_device")
    }

    async fn key_clear(&self, _path: &str, _index: u8) -> Result<i32> {
        Self::unsupported("key_clear")
    }

    async fn key_all_clear(&self, _path: &str) -> Result<i32> {
        Self::unsupported("key_all_clear")
    }

    async fn get_input_report(&self, path: &str, length: usize) -> Result<Vec<u8>> {
        self.with_device(path, move |device| {
            let mut buf = vec![0u8; length];
            let n = device.get_input_report(&mut buf).map_err(io_error)?;
            buf.truncate(n);
            Ok(buf)
        })
        .await
    }

    async fn disconnected(&self, _path: &str) -> Result<i32> {
        Self::unsupported("disconnected")
    }
}
