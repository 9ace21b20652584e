//! Live set of tracked decks, keyed by device path

use crate::device::DeviceHandle;
use crate::error::{DeckError, Result};
use parking_lot::RwLock;
use protocol::DeviceIdentity;

/// Deduplicated registry of device handles
///
/// Readers get snapshots, so iterating never blocks a concurrent mutation.
#[derive(Default)]
pub struct DeviceRegistry {
    handles: RwLock<Vec<DeviceHandle>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a handle; fails if its path is already tracked
    pub fn insert(&self, handle: DeviceHandle) -> Result<()> {
        let mut handles = self.handles.write();
        if handles.iter().any(|h| h.path() == handle.path()) {
            return Err(DeckError::DuplicatePath(handle.path().to_string()));
        }
        handles.push(handle);
        Ok(())
    }

    /// Stop tracking the handle with this identity
    ///
    /// Absent identities are a no-op.
    pub fn remove(&self, identity: &DeviceIdentity) -> Option<DeviceHandle> {
        let mut handles = self.handles.write();
        let index = handles.iter().position(|h| h.identity() == identity)?;
        Some(handles.remove(index))
    }

    /// Snapshot of every tracked handle
    pub fn list(&self) -> Vec<DeviceHandle> {
        self.handles.read().clone()
    }

    /// Tracked handles of one (vendor, product) family
    pub fn find_by_vendor_product(&self, vendor_id: u16, product_id: u16) -> Vec<DeviceHandle> {
        self.handles
            .read()
            .iter()
            .filter(|h| h.identity().family_key() == (vendor_id, product_id))
            .cloned()
            .collect()
    }

    pub fn find_by_path(&self, path: &str) -> Option<DeviceHandle> {
        self.handles.read().iter().find(|h| h.path() == path).cloned()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.handles.read().iter().any(|h| h.path() == path)
    }

    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }

    /// Remove and return every handle
    pub fn drain(&self) -> Vec<DeviceHandle> {
        std::mem::take(&mut *self.handles.write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DeviceFamily;
    use crate::test_utils::MockTransport;
    use std::sync::Arc;

    fn handle(path: &str, pid: u16) -> DeviceHandle {
        let transport = Arc::new(MockTransport::new());
        DeviceHandle::new(
            DeviceIdentity::new(0x6603, pid, path),
            DeviceFamily::N3,
            transport,
        )
    }

    #[test]
    fn test_insert_rejects_duplicate_path() {
        let registry = DeviceRegistry::new();
        registry.insert(handle("A", 0x1002)).unwrap();

        let err = registry.insert(handle("A", 0x1003)).unwrap_err();
        assert!(matches!(err, DeckError::DuplicatePath(ref p) if p == "A"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_is_noop_when_absent() {
        let registry = DeviceRegistry::new();
        let h = handle("A", 0x1002);
        registry.insert(h.clone()).unwrap();

        assert!(registry.remove(h.identity()).is_some());
        assert!(registry.remove(h.identity()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove_matches_full_identity() {
        let registry = DeviceRegistry::new();
        registry.insert(handle("A", 0x1002)).unwrap();

        let other = DeviceIdentity::new(0x6603, 0x1003, "A");
        assert!(registry.remove(&other).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_by_vendor_product() {
        let registry = DeviceRegistry::new();
        registry.insert(handle("A", 0x1002)).unwrap();
        registry.insert(handle("B", 0x1002)).unwrap();
        registry.insert(handle("C", 0x1003)).unwrap();

        assert_eq!(registry.find_by_vendor_product(0x6603, 0x1002).len(), 2);
        assert_eq!(registry.find_by_vendor_product(0x6603, 0x1003).len(), 1);
        assert!(registry.find_by_vendor_product(0x5500, 0x1001).is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = DeviceRegistry::new();
        registry.insert(handle("A", 0x1002)).unwrap();

        let snapshot = registry.list();
        registry.insert(handle("B", 0x1002)).unwrap();
        assert_eq!(snapshot.len(), 1);

        let drained = registry.drain();
        assert_eq!(drained.len(), 2);
        assert!(registry.is_empty());
        assert!(registry.find_by_path("A").is_none());
    }
}
