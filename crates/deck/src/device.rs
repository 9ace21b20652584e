//! Deck device handles
//!
//! A [`DeviceHandle`] is a cheap, clonable reference to one attached deck.
//! All clones share the same read loop and teardown state, so closing any
//! clone closes the device once.

use crate::catalog::DeviceFamily;
use crate::error::{DeckError, Result as DeckResult};
use crate::image::{ImageProcessor, ProcessedImage};
use crate::read_loop::{DEFAULT_READ_INTERVAL, KeyCallback, LoopState, ReadLoop};
use crate::transport::DeviceTransport;
use async_trait::async_trait;
use protocol::{DeviceIdentity, DeviceMode, ImageFormat, ReadResult, Result};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info};

struct Inner {
    identity: DeviceIdentity,
    family: DeviceFamily,
    transport: Arc<dyn DeviceTransport>,
    read_loop: ReadLoop,
    read_interval: Duration,
    closed: AtomicBool,
}

/// Handle to one attached deck
#[derive(Clone)]
pub struct DeviceHandle {
    inner: Arc<Inner>,
}

/// Non-owning handle reference held by the read loop task
pub(crate) struct WeakHandle(Weak<Inner>);

impl WeakHandle {
    pub(crate) fn upgrade(&self) -> Option<DeviceHandle> {
        self.0.upgrade().map(|inner| DeviceHandle { inner })
    }
}

impl DeviceHandle {
    /// Create a handle polling at the default interval
    pub fn new(
        identity: DeviceIdentity,
        family: DeviceFamily,
        transport: Arc<dyn DeviceTransport>,
    ) -> Self {
        Self::with_read_interval(identity, family, transport, DEFAULT_READ_INTERVAL)
    }

    /// Create a handle with a custom read cadence
    pub fn with_read_interval(
        identity: DeviceIdentity,
        family: DeviceFamily,
        transport: Arc<dyn DeviceTransport>,
        read_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                identity,
                family,
                transport,
                read_loop: ReadLoop::new(),
                read_interval,
                closed: AtomicBool::new(false),
            }),
        }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    pub fn path(&self) -> &str {
        &self.inner.identity.path
    }

    pub fn family(&self) -> DeviceFamily {
        self.inner.family
    }

    /// Whether two handles refer to the same tracked instance
    pub fn ptr_eq(&self, other: &DeviceHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakHandle {
        WeakHandle(Arc::downgrade(&self.inner))
    }

    pub(crate) fn read_loop(&self) -> &ReadLoop {
        &self.inner.read_loop
    }

    fn transport(&self) -> &dyn DeviceTransport {
        self.inner.transport.as_ref()
    }

    /// Open the device through the transport
    pub async fn open(&self) -> Result<()> {
        self.transport().open(self.path()).await?;
        self.inner.closed.store(false, Ordering::SeqCst);
        debug!("Opened deck {}", self.identity());
        Ok(())
    }

    /// Wake the screen, set full brightness, clear all icons and refresh
    pub async fn init(&self) -> Result<()> {
        self.wake_screen().await?;
        self.set_brightness(100).await?;
        self.clear_all_icons().await?;
        self.refresh().await?;
        Ok(())
    }

    /// Read one input report
    pub async fn read(&self) -> Result<ReadResult> {
        self.transport().read(self.path(), None).await
    }

    pub async fn refresh(&self) -> Result<i32> {
        self.transport().refresh(self.path()).await
    }

    pub async fn wake_screen(&self) -> Result<i32> {
        self.transport().wake_screen(self.path()).await
    }

    pub async fn set_brightness(&self, percent: u8) -> Result<i32> {
        self.transport()
            .set_brightness(self.path(), percent.min(100))
            .await
    }

    pub async fn clear_all_icons(&self) -> Result<i32> {
        self.transport().key_all_clear(self.path()).await
    }

    pub async fn clear_key(&self, index: u8) -> Result<i32> {
        self.transport().key_clear(self.path(), index).await
    }

    pub async fn switch_mode(&self, mode: DeviceMode) -> Result<i32> {
        self.transport().switch_mode(self.path(), mode).await
    }

    /// Upload an already-encoded key image file
    pub async fn set_key_image_raw(&self, image: &Path, key: u8) -> Result<i32> {
        self.transport().set_key_img(self.path(), image, key).await
    }

    /// Upload an already-encoded background image
    pub async fn set_background_image(&self, data: &[u8]) -> Result<i32> {
        self.transport()
            .set_background_img(self.path(), data, data.len())
            .await
    }

    pub async fn disconnected(&self) -> Result<i32> {
        self.transport().disconnected(self.path()).await
    }

    /// Register a key callback and (re)start the read loop
    ///
    /// Any previous loop is stopped first, waiting for its in-flight read.
    pub async fn set_key_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&DeviceHandle, u8, u8) + Send + Sync + 'static,
    {
        self.start_reading(Arc::new(callback)).await
    }

    /// Register an async key callback
    ///
    /// Each key event runs the callback as its own tokio task; errors are
    /// logged and never reach the read loop.
    pub async fn set_key_callback_async<F, Fut, E>(&self, callback: F) -> Result<()>
    where
        F: Fn(DeviceHandle, u8, u8) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let callback = Arc::new(callback);
        let dispatch: KeyCallback = Arc::new(move |handle: &DeviceHandle, key, state| {
            let fut = callback(handle.clone(), key, state);
            let path = handle.path().to_string();
            tokio::spawn(async move {
                if let Err(e) = fut.await {
                    error!("Async key callback failed for {}: {}", path, e);
                }
            });
        });
        self.start_reading(dispatch).await
    }

    async fn start_reading(&self, callback: KeyCallback) -> Result<()> {
        if self.is_closed() {
            return Err(protocol::DeviceError::NotOpen(self.path().to_string()));
        }
        self.inner
            .read_loop
            .start(self, callback, self.inner.read_interval)
            .await;
        Ok(())
    }

    /// Stop the read loop, waiting for the in-flight read
    pub async fn stop_reading(&self) {
        self.inner.read_loop.stop().await;
    }

    /// Stop reading and release the device
    ///
    /// Teardown (clear icons, disconnect, transport close) runs once no
    /// matter how many clones call this; failures are logged.
    pub async fn close(&self) {
        self.inner.read_loop.stop().await;
        self.teardown().await;
    }

    /// Best-effort teardown; returns false if it already ran
    pub(crate) async fn teardown(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return false;
        }

        let path = self.path();
        if let Err(e) = self.transport().key_all_clear(path).await {
            debug!("Clearing icons on {} failed: {}", path, e);
        }
        if let Err(e) = self.transport().disconnected(path).await {
            debug!("Disconnect notice to {} failed: {}", path, e);
        }
        if let Err(e) = self.transport().close(path).await {
            debug!("Closing {} failed: {}", path, e);
        }
        info!("Closed deck {}", self.identity());
        true
    }

    pub fn is_reading(&self) -> bool {
        self.inner.read_loop.state() == LoopState::Running
    }

    pub fn read_state(&self) -> LoopState {
        self.inner.read_loop.state()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Dual-display view of this deck, for families with a touch display
    pub fn as_dual_display(&self, images: Arc<dyn ImageProcessor>) -> Option<DualDisplayDeck> {
        self.family().has_dual_display().then(|| DualDisplayDeck {
            handle: self.clone(),
            images,
        })
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("identity", &self.inner.identity)
            .field("family", &self.inner.family)
            .field("state", &self.read_state())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Image uploads for decks with a touch display
#[async_trait]
pub trait SupportsDualDisplayImaging {
    /// Upload a touchscreen background from any image file
    async fn set_touchscreen_image(&self, source: &Path) -> DeckResult<i32>;

    /// Upload a key image from any image file
    async fn set_key_image(&self, source: &Path, key: u8) -> DeckResult<i32>;

    /// Upload a key image through the raw data channel
    async fn set_key_image_data(&self, source: &Path, key: u8) -> DeckResult<i32>;

    /// Read the serial number input report
    async fn serial_number(&self, length: usize) -> DeckResult<Vec<u8>>;
}

/// Touchscreen target: 320x240, rotated 90 degrees, JPEG
pub fn touchscreen_image_format() -> ImageFormat {
    ImageFormat::jpeg((320, 240), 90)
}

/// Key target: 64x64, rotated 90 degrees, JPEG
pub fn key_image_format() -> ImageFormat {
    ImageFormat::jpeg((64, 64), 90)
}

/// A [`DeviceHandle`] viewed as a dual-display deck
#[derive(Clone)]
pub struct DualDisplayDeck {
    handle: DeviceHandle,
    images: Arc<dyn ImageProcessor>,
}

impl DualDisplayDeck {
    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }

    async fn prepare(&self, source: &Path, format: ImageFormat) -> DeckResult<ProcessedImage> {
        let images = self.images.clone();
        let owned: PathBuf = source.to_path_buf();
        let processed = tokio::task::spawn_blocking(move || images.process(&owned, &format))
            .await
            .ok()
            .flatten();
        processed.ok_or_else(|| DeckError::ImageUnavailable(source.display().to_string()))
    }
}

#[async_trait]
impl SupportsDualDisplayImaging for DualDisplayDeck {
    async fn set_touchscreen_image(&self, source: &Path) -> DeckResult<i32> {
        let image = self.prepare(source, touchscreen_image_format()).await?;
        let result = self
            .handle
            .transport()
            .set_background_img_dual_device(self.handle.path(), image.path())
            .await;
        image.dispose();
        Ok(result?)
    }

    async fn set_key_image(&self, source: &Path, key: u8) -> DeckResult<i32> {
        let image = self.prepare(source, key_image_format()).await?;
        let result = self
            .handle
            .transport()
            .set_key_img_dual_device(self.handle.path(), image.path(), key)
            .await;
        image.dispose();
        Ok(result?)
    }

    async fn set_key_image_data(&self, source: &Path, key: u8) -> DeckResult<i32> {
        let image = self.prepare(source, key_image_format()).await?;
        let result = self
            .handle
            .transport()
            .set_key_img_data_dual_device(self.handle.path(), image.path(), key)
            .await;
        image.dispose();
        Ok(result?)
    }

    async fn serial_number(&self, length: usize) -> DeckResult<Vec<u8>> {
        Ok(self
            .handle
            .transport()
            .get_input_report(self.handle.path(), length)
            .await?)
    }
}
