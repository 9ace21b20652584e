//! Composition root
//!
//! A [`DeviceManager`] owns the shared transport, the catalog and the
//! registry. It offers a one-shot [`enumerate`](DeviceManager::enumerate)
//! and a continuous [`listen`](DeviceManager::listen).

use crate::catalog::DiscoveryCatalog;
use crate::device::DeviceHandle;
use crate::error::Result;
use crate::monitor::{HotplugMonitor, ListenOptions};
use crate::registry::DeviceRegistry;
use crate::transport::DeviceTransport;
use std::sync::Arc;
use tracing::debug;

/// Discovers decks and hands out their handles
pub struct DeviceManager {
    transport: Arc<dyn DeviceTransport>,
    catalog: Arc<DiscoveryCatalog>,
    registry: Arc<DeviceRegistry>,
}

impl DeviceManager {
    /// Manager over `transport` with the built-in catalog
    pub fn new(transport: Arc<dyn DeviceTransport>) -> Self {
        Self::with_catalog(transport, DiscoveryCatalog::builtin())
    }

    /// Manager over `transport` with an explicit catalog
    pub fn with_catalog(transport: Arc<dyn DeviceTransport>, catalog: DiscoveryCatalog) -> Self {
        Self {
            transport,
            catalog: Arc::new(catalog),
            registry: Arc::new(DeviceRegistry::new()),
        }
    }

    /// Scan every catalog family and return all known decks
    ///
    /// New devices are appended; paths already tracked are skipped, so
    /// repeated calls never duplicate a deck. Handles are not opened.
    pub async fn enumerate(&self) -> Result<Vec<DeviceHandle>> {
        for (vendor_id, product_id) in self.catalog.families() {
            let Some(family) = self.catalog.lookup(vendor_id, product_id) else {
                continue;
            };

            for identity in self.transport.enumerate(vendor_id, product_id).await? {
                if self.registry.contains_path(&identity.path) {
                    continue;
                }
                let handle = DeviceHandle::new(identity, family, self.transport.clone());
                if let Err(e) = self.registry.insert(handle) {
                    debug!("Skipping enumerated deck: {}", e);
                }
            }
        }

        Ok(self.registry.list())
    }

    /// Start a hotplug monitor sharing this manager's registry
    pub async fn listen(&self, options: ListenOptions) -> HotplugMonitor {
        HotplugMonitor::start(
            self.transport.clone(),
            self.catalog.clone(),
            self.registry.clone(),
            options,
        )
        .await
    }

    /// Snapshot of tracked decks
    pub fn devices(&self) -> Vec<DeviceHandle> {
        self.registry.list()
    }

    pub fn catalog(&self) -> &DiscoveryCatalog {
        &self.catalog
    }

    pub fn transport(&self) -> Arc<dyn DeviceTransport> {
        self.transport.clone()
    }
}
