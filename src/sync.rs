//! A module which decides which synchronization primitives to use throughout the rest of the crate
//! depending on features and configuration options

use std::sync::PoisonError;

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{AtomicU64, Ordering};
        pub(crate) use loom::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::atomic::{AtomicU64, Ordering};
        pub(crate) use shuttle::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
    } else {
        // the model checkers cannot see inside dashmap's shards
        pub(crate) use dashmap::DashMap;
        pub(crate) use std::sync::atomic::{AtomicU64, Ordering};
        pub(crate) use std::sync::{Arc, Mutex, MutexGuard};
    }
}

// Detector state is updated before any caller code runs under these guards, so a poisoned guard
// still protects consistent state and is recovered.

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(any(loom, feature = "shuttle"))]
pub(crate) fn read<T>(rw_lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    rw_lock.read().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(any(loom, feature = "shuttle"))]
pub(crate) fn write<T>(rw_lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    rw_lock.write().unwrap_or_else(PoisonError::into_inner)
}
