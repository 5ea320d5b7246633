use core::marker::PhantomData;

use tracing::instrument;

use crate::config::Config;
use crate::err::Error;
use crate::lock::{LockState, LockStore};
use crate::monitored::Monitored;
use crate::race::{RaceEvent, RaceRecord};
use crate::shadow::{ShadowEntry, ShadowMemory};
use crate::sync::{self, AtomicU64, Ordering};
use crate::thread::{check_capacity, ThreadHandle, ThreadRegistry, ThreadState};
use crate::types::{AccessKind, Address, ThreadId, DEFAULT_MAX_THREADS};

pub use epoch::{EpochEntry, FastTrack};
pub use precise::{Precise, PreciseEntry};

mod epoch;
mod precise;

/// A single monitored access about to happen.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Access {
    pub address: Address,
    pub kind: AccessKind,
}

/// A race rule: how to check an access against a location's [ShadowEntry] and update it.
///
/// Both the entry and the accessing thread's state are locked by the caller for the duration of
/// [AccessRule::check].
pub trait AccessRule<const K: usize> {
    type Entry: ShadowEntry;

    /// Report every race `access` forms with the accesses recorded in `entry` into the entry's
    /// [RaceRecord], record `access`, and return how many races were counted.
    fn check(
        entry: &mut Self::Entry,
        thread: &mut ThreadState<K>,
        access: Access,
        config: &Config,
    ) -> Result<u64, Error>;
}

/// A race detector which checks every access with the full vector clock rule.
pub type PreciseDetector<const K: usize = DEFAULT_MAX_THREADS> = Detector<Precise, K>;

/// A race detector which checks every access with the FastTrack epoch rule.
pub type EpochDetector<const K: usize = DEFAULT_MAX_THREADS> = Detector<FastTrack, K>;

/// All state needed to observe one program: its threads, its locks and its monitored locations.
///
/// `K` is the maximum number of threads the detector will ever observe; every vector clock has
/// `K` coordinates. Thread identities are never recycled, so `K` bounds the number of
/// [Detector::on_thread_start] calls, not the number of simultaneously live threads.
///
/// Every operation takes `&self`, so a detector is typically shared between the observed threads
/// in an `Arc` or by reference from a scope.
#[derive(Debug)]
pub struct Detector<R, const K: usize = DEFAULT_MAX_THREADS>
where
    R: AccessRule<K>,
{
    config: Config,
    threads: ThreadRegistry<K>,
    locks: LockStore<K>,
    shadow: ShadowMemory<R::Entry>,
    /// Sum of the races counted across every location, including forgotten ones.
    total_races: AtomicU64,
    rule: PhantomData<fn() -> R>,
}

impl<R, const K: usize> Detector<R, K>
where
    R: AccessRule<K>,
{
    pub fn new() -> Result<Self, Error> {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Result<Self, Error> {
        check_capacity::<K>()?;
        Ok(Self {
            config,
            threads: ThreadRegistry::new(),
            locks: LockStore::new(),
            shadow: ShadowMemory::new(),
            total_races: AtomicU64::new(0),
            rule: PhantomData,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start monitoring `address` with a neutral entry. Idempotent; returns whether the entry
    /// was created by this call.
    pub fn monitor_init(&self, address: Address) -> bool {
        self.shadow.monitor_init(address)
    }

    /// Stop monitoring `address`, e.g. because the object living there was dropped.
    pub fn forget(&self, address: Address) -> bool {
        self.shadow.forget(address)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn on_thread_start(&self) -> Result<ThreadHandle<K>, Error> {
        self.threads.register_thread()
    }

    #[instrument(level = "trace", skip_all, fields(parent = parent.thread_id(), child = child.thread_id()))]
    pub fn on_thread_fork(
        &self,
        parent: &ThreadHandle<K>,
        child: &ThreadHandle<K>,
    ) -> Result<(), Error> {
        self.threads.fork(parent, child)
    }

    #[instrument(level = "trace", skip_all, fields(parent = parent.thread_id(), child = child.thread_id()))]
    pub fn on_thread_join(
        &self,
        parent: &ThreadHandle<K>,
        child: &ThreadHandle<K>,
    ) -> Result<(), Error> {
        self.threads.join(parent, child)
    }

    #[instrument(level = "trace", skip_all, fields(thread = thread.thread_id()))]
    pub fn on_thread_exit(&self, thread: &ThreadHandle<K>) -> Result<(), Error> {
        self.threads.exit(thread)
    }

    #[instrument(level = "trace", skip(self, thread), fields(thread = thread.thread_id()))]
    pub fn on_lock_acquire(&self, lock: Address, thread: &ThreadHandle<K>) -> Result<(), Error> {
        self.threads.ensure_registered(thread)?;
        self.locks.acquire(lock, thread)
    }

    #[instrument(level = "trace", skip(self, thread), fields(thread = thread.thread_id()))]
    pub fn on_lock_release(&self, lock: Address, thread: &ThreadHandle<K>) -> Result<(), Error> {
        self.threads.ensure_registered(thread)?;
        self.locks.release(lock, thread)
    }

    /// Drop the state of a lock which no longer exists.
    pub fn forget_lock(&self, lock: Address) -> bool {
        self.locks.forget(lock)
    }

    /// Check an access of `kind` by `thread` to `address`, then perform it by calling `access`.
    ///
    /// `access` runs while the location's entry is locked, so accesses to one address through
    /// this detector are serialized with their checks. It must not call back into the detector
    /// for the same address. The thread's own state is unlocked again once the check is done,
    /// before `access` runs: it only ever changes on that thread's behalf, and `access` may query
    /// it or touch other monitored addresses. A race never prevents `access` from running; only
    /// a broken detector, an exited thread or a foreign handle does.
    #[instrument(level = "trace", skip(self, thread, access), fields(thread = thread.thread_id()))]
    pub fn on_access<T>(
        &self,
        address: Address,
        thread: &ThreadHandle<K>,
        kind: AccessKind,
        access: impl FnOnce() -> T,
    ) -> Result<T, Error> {
        self.threads.ensure_registered(thread)?;
        let entry_cell = self.shadow.resolve(address);
        let mut entry = sync::lock(&entry_cell);
        let counted: u64 = {
            let mut thread_state = thread.lock();
            thread_state.ensure_alive()?;
            R::check(&mut entry, &mut thread_state, Access { address, kind }, &self.config)?
        };
        if counted > 0 {
            self.total_races.fetch_add(counted, Ordering::Relaxed);
        }
        Ok(access())
    }

    pub fn on_read<T: Copy>(
        &self,
        location: &Monitored<T>,
        thread: &ThreadHandle<K>,
    ) -> Result<T, Error> {
        self.on_access(location.address(), thread, AccessKind::Read, || {
            location.load()
        })
    }

    pub fn on_write<T: Copy>(
        &self,
        location: &Monitored<T>,
        thread: &ThreadHandle<K>,
        value: T,
    ) -> Result<(), Error> {
        self.on_access(location.address(), thread, AccessKind::Write, || {
            location.store(value)
        })
    }

    /// The number of races counted on `address`; 0 if it is not monitored.
    pub fn race_count(&self, address: Address) -> u64 {
        self.shadow
            .races(address)
            .map_or(0, |races| races.count())
    }

    /// The races recorded on `address`, oldest first.
    pub fn race_events(&self, address: Address) -> Vec<RaceEvent> {
        self.shadow
            .races(address)
            .map_or_else(Vec::new, |races| races.events().to_vec())
    }

    pub fn races(&self, address: Address) -> Option<RaceRecord> {
        self.shadow.races(address)
    }

    pub fn total_races(&self) -> u64 {
        self.total_races.load(Ordering::Relaxed)
    }

    /// A copy of the shadow entry of `address`, if it is monitored.
    pub fn entry(&self, address: Address) -> Option<R::Entry> {
        self.shadow.entry(address)
    }

    pub fn lock_state(&self, lock: Address) -> Option<LockState<K>> {
        self.locks.state(lock)
    }

    pub fn thread(&self, thread_id: ThreadId) -> Option<ThreadHandle<K>> {
        self.threads.get(thread_id)
    }

    pub fn threads_registered(&self) -> usize {
        self.threads.len()
    }

    pub fn monitored_locations(&self) -> usize {
        self.shadow.len()
    }
}
