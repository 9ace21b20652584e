//! Hotplug reconciliation
//!
//! The OS gives us no hotplug callback for these decks, so the monitor polls.
//! Every tick runs an attach pass over the full HID listing and then a detach
//! pass that re-enumerates each tracked (vendor, product) family. Registry
//! changes and their notifications happen under the event hub lock, so a new
//! subscriber sees every device exactly once: either in its seeded backlog or
//! as a later event.

use crate::catalog::DiscoveryCatalog;
use crate::device::DeviceHandle;
use crate::error::{DeckError, Result};
use crate::read_loop::DEFAULT_READ_INTERVAL;
use crate::registry::DeviceRegistry;
use crate::transport::DeviceTransport;
use common::{EventHub, Subscription};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default reconciliation cadence
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(1);

/// Options for [`crate::DeviceManager::listen`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenOptions {
    /// Seed every new subscriber with `Added` for already-tracked decks
    pub emit_existing: bool,
    /// Time between reconciliation ticks
    pub reconcile_interval: Duration,
    /// Read loop cadence for handles the monitor creates
    pub read_interval: Duration,
}

impl Default for ListenOptions {
    fn default() -> Self {
        Self {
            emit_existing: false,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            read_interval: DEFAULT_READ_INTERVAL,
        }
    }
}

/// Hotplug notification
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Added(DeviceHandle),
    Removed(DeviceHandle),
}

impl MonitorEvent {
    pub fn handle(&self) -> &DeviceHandle {
        match self {
            MonitorEvent::Added(handle) | MonitorEvent::Removed(handle) => handle,
        }
    }

    pub fn is_added(&self) -> bool {
        matches!(self, MonitorEvent::Added(_))
    }
}

struct Shared {
    transport: Arc<dyn DeviceTransport>,
    catalog: Arc<DiscoveryCatalog>,
    registry: Arc<DeviceRegistry>,
    hub: EventHub<MonitorEvent>,
    options: ListenOptions,
    closed: AtomicBool,
    // Periodic and on-demand ticks never interleave
    tick: tokio::sync::Mutex<()>,
}

struct TickTask {
    cancel: watch::Sender<bool>,
    join: JoinHandle<()>,
}

/// Running hotplug monitor
///
/// Dropping the monitor stops the tick; [`close`](Self::close) also releases
/// every tracked deck.
pub struct HotplugMonitor {
    shared: Arc<Shared>,
    task: Mutex<Option<TickTask>>,
}

impl HotplugMonitor {
    /// Run one reconciliation and start ticking
    pub async fn start(
        transport: Arc<dyn DeviceTransport>,
        catalog: Arc<DiscoveryCatalog>,
        registry: Arc<DeviceRegistry>,
        options: ListenOptions,
    ) -> Self {
        let shared = Arc::new(Shared {
            transport,
            catalog,
            registry,
            hub: EventHub::new(),
            options,
            closed: AtomicBool::new(false),
            tick: tokio::sync::Mutex::new(()),
        });

        shared.reconcile().await;

        let (cancel, cancel_rx) = watch::channel(false);
        let join = tokio::spawn(run(shared.clone(), cancel_rx));
        info!(
            "Hotplug monitor started ({} decks, tick {:?})",
            shared.registry.len(),
            shared.options.reconcile_interval
        );

        Self {
            shared,
            task: Mutex::new(Some(TickTask { cancel, join })),
        }
    }

    /// Subscribe to `Added`/`Removed` notifications
    ///
    /// With `emit_existing`, the subscription starts with `Added` for every
    /// deck tracked at this moment.
    pub fn subscribe(&self) -> Subscription<MonitorEvent> {
        let mut hub = self.shared.hub.lock();
        let backlog = if self.shared.options.emit_existing {
            self.shared
                .registry
                .list()
                .into_iter()
                .map(MonitorEvent::Added)
                .collect()
        } else {
            Vec::new()
        };
        hub.subscribe_with(backlog)
    }

    /// Run one reconciliation tick now
    pub async fn reconcile(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DeckError::MonitorClosed);
        }
        self.shared.reconcile().await;
        Ok(())
    }

    /// Snapshot of tracked decks
    pub fn devices(&self) -> Vec<DeviceHandle> {
        self.shared.registry.list()
    }

    pub fn options(&self) -> &ListenOptions {
        &self.shared.options
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Stop polling, close every tracked deck and end all subscriptions
    ///
    /// Idempotent.
    pub async fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.cancel.send(true);
            let _ = task.join.await;
        }

        // Let an on-demand tick finish before tearing down
        let _tick = self.shared.tick.lock().await;

        let handles = self.shared.registry.drain();
        let count = handles.len();
        for handle in handles {
            handle.close().await;
        }
        self.shared.hub.close();
        info!("Hotplug monitor closed ({} decks released)", count);
    }
}

async fn run(shared: Arc<Shared>, mut cancel: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(shared.options.reconcile_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately and `start` already reconciled
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = cancel.changed() => break,
            _ = ticker.tick() => {}
        }

        shared.reconcile().await;
    }
    debug!("Hotplug tick stopped");
}

impl Shared {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn reconcile(&self) {
        let _tick = self.tick.lock().await;
        if self.is_closed() {
            return;
        }

        self.attach_pass().await;
        self.detach_pass().await;
    }

    async fn attach_pass(&self) {
        let listing = match self.transport.list_devices().await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("HID listing failed: {}", e);
                return;
            }
        };

        for info in listing.into_iter().filter(|d| d.is_vendor_interface()) {
            let identity = info.identity;
            let Some(family) = self
                .catalog
                .lookup(identity.vendor_id, identity.product_id)
            else {
                continue;
            };

            if let Some(existing) = self.registry.find_by_path(&identity.path) {
                if !existing.is_closed() {
                    continue;
                }
                // Read loop faulted while the device stayed attached
                debug!("Replacing faulted handle for {}", existing.identity());
                self.evict(&existing);
            }

            let handle = DeviceHandle::with_read_interval(
                identity,
                family,
                self.transport.clone(),
                self.options.read_interval,
            );
            if let Err(e) = handle.open().await {
                warn!("Failed to open {}: {}", handle.identity(), e);
                continue;
            }

            match self.track(handle.clone()) {
                Ok(()) => info!("Deck added: {} ({})", handle.identity(), family),
                Err(DeckError::MonitorClosed) => {
                    handle.close().await;
                    return;
                }
                Err(e) => debug!("Skipping {}: {}", handle.identity(), e),
            }
        }
    }

    async fn detach_pass(&self) {
        let mut present: HashMap<(u16, u16), bool> = HashMap::new();

        for handle in self.registry.list() {
            let key = handle.identity().family_key();
            let still_present = match present.get(&key) {
                Some(found) => *found,
                None => match self.transport.enumerate(key.0, key.1).await {
                    Ok(found) => {
                        present.insert(key, !found.is_empty());
                        !found.is_empty()
                    }
                    Err(e) => {
                        warn!("Enumerate {:04x}:{:04x} failed: {}", key.0, key.1, e);
                        continue;
                    }
                },
            };

            if !still_present {
                handle.close().await;
                if self.evict(&handle) {
                    info!("Deck removed: {}", handle.identity());
                }
            }
        }
    }

    /// Insert and announce under the hub lock
    fn track(&self, handle: DeviceHandle) -> Result<()> {
        let mut hub = self.hub.lock();
        if hub.is_closed() || self.is_closed() {
            return Err(DeckError::MonitorClosed);
        }
        self.registry.insert(handle.clone())?;
        hub.publish(MonitorEvent::Added(handle));
        Ok(())
    }

    /// Remove and announce under the hub lock; false if already gone
    fn evict(&self, handle: &DeviceHandle) -> bool {
        let mut hub = self.hub.lock();
        match self.registry.remove(handle.identity()) {
            Some(removed) => {
                hub.publish(MonitorEvent::Removed(removed));
                true
            }
            None => false,
        }
    }
}
