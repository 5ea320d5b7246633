use tracing::trace;

use crate::clock::VectorClock;
use crate::err::Error;
use crate::shadow::ConcurrentTable;
use crate::sync;
use crate::thread::ThreadHandle;
use crate::types::Address;

/// The clock published by the most recent release of one monitored lock.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LockState<const K: usize> {
    clock: VectorClock<K>,
}

impl<const K: usize> LockState<K> {
    pub fn clock(&self) -> &VectorClock<K> {
        &self.clock
    }
}

/// One [LockState] per monitored lock, created all-zero the first time the lock is used.
///
/// The store trusts the thread handles it is given; a [Detector](crate::Detector) checks that
/// they came from its own registry first.
#[derive(Debug)]
pub struct LockStore<const K: usize> {
    locks: ConcurrentTable<LockState<K>>,
}

impl<const K: usize> LockStore<K> {
    pub fn new() -> Self {
        Self {
            locks: ConcurrentTable::new(),
        }
    }

    /// `thread` learns everything known as of the last release of `lock`.
    pub fn acquire(&self, lock: Address, thread: &ThreadHandle<K>) -> Result<(), Error> {
        let (lock_cell, _) = self.locks.get_or_insert_with(lock, LockState::default);
        let lock_state = sync::lock(&lock_cell);
        let mut thread_state = thread.lock();
        thread_state.ensure_alive()?;

        thread_state.observe(&lock_state.clock);
        trace!(lock, thread_id = thread.thread_id(), "acquire");
        Ok(())
    }

    /// Publish everything `thread` knows through `lock`, then move `thread` to a new epoch so
    /// its next action is ordered after the release.
    pub fn release(&self, lock: Address, thread: &ThreadHandle<K>) -> Result<(), Error> {
        let (lock_cell, _) = self.locks.get_or_insert_with(lock, LockState::default);
        let mut lock_state = sync::lock(&lock_cell);
        let mut thread_state = thread.lock();
        thread_state.ensure_alive()?;

        lock_state.clock.clone_from(thread_state.clock());
        let epoch = thread_state.tick()?;
        trace!(lock, thread_id = thread.thread_id(), %epoch, "release");
        Ok(())
    }

    /// A copy of the state of `lock`, if it was ever used.
    pub fn state(&self, lock: Address) -> Option<LockState<K>> {
        self.locks.get(lock).map(|cell| sync::lock(&cell).clone())
    }

    /// Drop the state of a lock which no longer exists.
    pub fn forget(&self, lock: Address) -> bool {
        self.locks.remove(lock)
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const K: usize> Default for LockStore<K> {
    fn default() -> Self {
        Self::new()
    }
}
