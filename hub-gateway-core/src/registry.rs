use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent set of device identities currently held by the connection
/// cache, maintained purely as a side effect of cache population and
/// eviction. The poller reads it to decide which devices to scan.
///
/// Each identity carries the serial of the cache entry that registered it.
/// Eviction notifications can arrive after a fresh entry has already replaced
/// the evicted one under the same identity; the serial keeps such a late
/// removal from unregistering the successor.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<DashMap<String, u64>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&self, identity: &str, serial: u64) {
        self.devices.insert(identity.to_owned(), serial);
    }

    pub(crate) fn remove(&self, identity: &str, serial: u64) {
        self.devices.remove_if(identity, |_, registered| *registered == serial);
    }

    /// Point-in-time copy of the registered identities.
    ///
    /// An identity may be evicted between the snapshot and a later cache
    /// lookup; callers treat that as a skip, not an error.
    pub fn snapshot(&self) -> Vec<String> {
        self.devices.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.devices.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
