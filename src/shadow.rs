//! Per-location metadata, created lazily on first access.
//!
//! Every location owns its own lock, so checks on different addresses never contend. The map
//! from address to location is a sharded [DashMap](dashmap::DashMap); under loom and shuttle it is
//! a plain map behind a model-checked read-write lock instead.

#[cfg(any(loom, feature = "shuttle"))]
use std::collections::HashMap;

use tracing::trace;

use crate::race::RaceRecord;
use crate::sync::{self, Arc, Mutex};
#[cfg(not(any(loom, feature = "shuttle")))]
use crate::sync::DashMap;
#[cfg(any(loom, feature = "shuttle"))]
use crate::sync::RwLock;
use crate::types::Address;

/// The per-location state an [AccessRule](crate::AccessRule) checks and updates.
pub trait ShadowEntry: Clone + core::fmt::Debug + Send + 'static {
    /// The neutral state of a location nobody has accessed yet.
    fn new(address: Address) -> Self;

    fn address(&self) -> Address;

    fn races(&self) -> &RaceRecord;
}

/// A concurrent insert-if-absent map whose values are individually locked.
#[derive(Debug)]
pub(crate) struct ConcurrentTable<V> {
    #[cfg(not(any(loom, feature = "shuttle")))]
    entries: DashMap<Address, Arc<Mutex<V>>>,

    #[cfg(any(loom, feature = "shuttle"))]
    entries: RwLock<HashMap<Address, Arc<Mutex<V>>>>,
}

#[cfg(not(any(loom, feature = "shuttle")))]
impl<V> ConcurrentTable<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    pub(crate) fn get(&self, address: Address) -> Option<Arc<Mutex<V>>> {
        self.entries.get(&address).map(|entry| entry.value().clone())
    }

    /// Return the value at `address`, inserting `create()` first if there is none. Concurrent
    /// callers for the same address always receive the same value.
    pub(crate) fn get_or_insert_with(
        &self,
        address: Address,
        create: impl FnOnce() -> V,
    ) -> (Arc<Mutex<V>>, bool) {
        if let Some(existing) = self.get(address) {
            return (existing, false);
        }

        let mut inserted: bool = false;
        let value: Arc<Mutex<V>> = self
            .entries
            .entry(address)
            .or_insert_with(|| {
                inserted = true;
                Arc::new(Mutex::new(create()))
            })
            .value()
            .clone();
        (value, inserted)
    }

    pub(crate) fn remove(&self, address: Address) -> bool {
        self.entries.remove(&address).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(any(loom, feature = "shuttle"))]
impl<V> ConcurrentTable<V> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) fn get(&self, address: Address) -> Option<Arc<Mutex<V>>> {
        sync::read(&self.entries).get(&address).cloned()
    }

    pub(crate) fn get_or_insert_with(
        &self,
        address: Address,
        create: impl FnOnce() -> V,
    ) -> (Arc<Mutex<V>>, bool) {
        if let Some(existing) = self.get(address) {
            return (existing, false);
        }

        let mut entries = sync::write(&self.entries);
        // another thread may have inserted between dropping the read lock and taking this one
        if let Some(existing) = entries.get(&address) {
            return (existing.clone(), false);
        }
        let created: Arc<Mutex<V>> = Arc::new(Mutex::new(create()));
        entries.insert(address, created.clone());
        (created, true)
    }

    pub(crate) fn remove(&self, address: Address) -> bool {
        sync::write(&self.entries).remove(&address).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        sync::read(&self.entries).len()
    }
}

/// Maps monitored addresses to their [ShadowEntry].
#[derive(Debug)]
pub struct ShadowMemory<E> {
    table: ConcurrentTable<E>,
}

impl<E: ShadowEntry> ShadowMemory<E> {
    pub fn new() -> Self {
        Self {
            table: ConcurrentTable::new(),
        }
    }

    /// Register `address` with a neutral entry. Returns `false` if it was already monitored, in
    /// which case its entry is left untouched.
    pub fn monitor_init(&self, address: Address) -> bool {
        let (_, inserted) = self.table.get_or_insert_with(address, || E::new(address));
        if inserted {
            trace!(address, "monitoring new location");
        }
        inserted
    }

    /// The entry for `address`, created if this is its first access.
    pub(crate) fn resolve(&self, address: Address) -> Arc<Mutex<E>> {
        let (entry, inserted) = self.table.get_or_insert_with(address, || E::new(address));
        if inserted {
            trace!(address, "monitoring new location on first access");
        }
        entry
    }

    /// A copy of the entry for `address`, if it is monitored.
    pub fn entry(&self, address: Address) -> Option<E> {
        self.table
            .get(address)
            .map(|entry| sync::lock(&entry).clone())
    }

    pub fn races(&self, address: Address) -> Option<RaceRecord> {
        self.table
            .get(address)
            .map(|entry| sync::lock(&entry).races().clone())
    }

    /// Stop monitoring `address`, dropping everything recorded about it.
    pub fn forget(&self, address: Address) -> bool {
        self.table.remove(address)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: ShadowEntry> Default for ShadowMemory<E> {
    fn default() -> Self {
        Self::new()
    }
}
