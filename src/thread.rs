use core::sync::atomic::{AtomicUsize, Ordering};

use tracing::{debug, error, trace};

use crate::clock::{Epoch, VectorClock};
use crate::err::{Error, FatalError};
use crate::sync::{self, Arc, Mutex, MutexGuard};
use crate::types::{convert_thread_index_to_thread_id, ThreadId, MAX_THREAD_ID};

/// Everything a single observed thread knows about the rest of the program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ThreadState<const K: usize> {
    thread_id: ThreadId,

    /// The thread's local vector clock.
    clock: VectorClock<K>,

    /// Always equal to `(thread_id, clock[thread_id])`, cached so epoch comparisons do not need to
    /// rebuild it.
    epoch: Epoch,

    exited: bool,
}

impl<const K: usize> ThreadState<K> {
    fn new(thread_id: ThreadId) -> Result<Self, FatalError> {
        let mut clock: VectorClock<K> = VectorClock::new();
        clock.set(thread_id, 1)?;
        Ok(Self {
            thread_id,
            clock,
            epoch: Epoch::construct(thread_id, 1),
            exited: false,
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn clock(&self) -> &VectorClock<K> {
        &self.clock
    }

    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Learn everything `other` knows.
    pub(crate) fn observe(&mut self, other: &VectorClock<K>) {
        self.clock.merge(other);
    }

    /// Start a new event in this thread's history, ordered strictly after every previous one.
    pub(crate) fn tick(&mut self) -> Result<Epoch, FatalError> {
        let clock = self.clock.increment(self.thread_id)?;
        self.epoch = Epoch::construct(self.thread_id, clock);
        Ok(self.epoch)
    }

    pub(crate) fn ensure_alive(&self) -> Result<(), Error> {
        if self.exited {
            error!(thread_id = self.thread_id, "exited thread was used");
            return Err(Error::ThreadExited(self.thread_id));
        }
        Ok(())
    }
}

/// Hands out the tags tying every [ThreadHandle] to the registry which created it. Only
/// uniqueness matters, so this is a plain atomic even under loom and shuttle.
static NEXT_REGISTRY_TAG: AtomicUsize = AtomicUsize::new(1);

/// A reference to one registered thread's state.
///
/// Cloning the handle does not register a new thread. Handles are meant to be moved into the
/// thread they describe, with clones kept by whichever thread later forks or joins it. A handle
/// belongs to the registry, and so the detector, which created it; any other registry rejects it
/// with [Error::ForeignThread].
#[derive(Clone, Debug)]
pub struct ThreadHandle<const K: usize> {
    thread_id: ThreadId,
    registry_tag: usize,
    state: Arc<Mutex<ThreadState<K>>>,
}

impl<const K: usize> ThreadHandle<K> {
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// A copy of the thread's current state.
    pub fn snapshot(&self) -> ThreadState<K> {
        self.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ThreadState<K>> {
        sync::lock(&self.state)
    }
}

/// Assigns identities to threads and keeps every thread's state for the detector's lifetime.
#[derive(Debug)]
pub struct ThreadRegistry<const K: usize> {
    tag: usize,

    /// Identity `i` is stored at index `i - 1`. The length doubles as the identity counter.
    threads: Mutex<Vec<ThreadHandle<K>>>,
}

impl<const K: usize> ThreadRegistry<K> {
    pub fn new() -> Self {
        Self {
            tag: NEXT_REGISTRY_TAG.fetch_add(1, Ordering::Relaxed),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Allocate the next identity and a fresh state whose clock only knows its own first event.
    pub fn register_thread(&self) -> Result<ThreadHandle<K>, Error> {
        check_capacity::<K>()?;
        let mut threads = sync::lock(&self.threads);
        let thread_id: ThreadId = convert_thread_index_to_thread_id(threads.len());
        if thread_id > K {
            error!(max_threads = K, "no thread slots left");
            return Err(Error::CapacityExceeded { max_threads: K });
        }

        let handle: ThreadHandle<K> = ThreadHandle {
            thread_id,
            registry_tag: self.tag,
            state: Arc::new(Mutex::new(ThreadState::new(thread_id)?)),
        };
        threads.push(handle.clone());
        debug!(thread_id, "registered thread");
        Ok(handle)
    }

    /// `child` inherits everything `parent` has observed; `parent`'s later events are ordered
    /// after the fork.
    pub fn fork(&self, parent: &ThreadHandle<K>, child: &ThreadHandle<K>) -> Result<(), Error> {
        self.ensure_registered(parent)?;
        self.ensure_registered(child)?;
        let (mut parent_state, mut child_state) = lock_pair(parent, child)?;
        parent_state.ensure_alive()?;
        child_state.ensure_alive()?;

        child_state.observe(&parent_state.clock);
        let epoch = parent_state.tick()?;
        trace!(parent = parent.thread_id, child = child.thread_id, %epoch, "fork");
        Ok(())
    }

    /// `parent` inherits everything `child` observed up to now; `child`'s later events, if any,
    /// are ordered after the join.
    pub fn join(&self, parent: &ThreadHandle<K>, child: &ThreadHandle<K>) -> Result<(), Error> {
        self.ensure_registered(parent)?;
        self.ensure_registered(child)?;
        let (mut parent_state, mut child_state) = lock_pair(parent, child)?;
        parent_state.ensure_alive()?;

        parent_state.observe(&child_state.clock);
        let epoch = child_state.tick()?;
        trace!(parent = parent.thread_id, child = child.thread_id, %epoch, "join");
        Ok(())
    }

    /// Mark `thread` as exited. Its identity is never handed out again.
    pub fn exit(&self, thread: &ThreadHandle<K>) -> Result<(), Error> {
        self.ensure_registered(thread)?;
        let mut state = thread.lock();
        state.ensure_alive()?;
        state.exited = true;
        debug!(thread_id = thread.thread_id, "thread exited");
        Ok(())
    }

    /// Fail unless `thread` was handed out by this registry.
    pub fn ensure_registered(&self, thread: &ThreadHandle<K>) -> Result<(), Error> {
        if thread.registry_tag != self.tag {
            error!(thread_id = thread.thread_id, "thread handle from another registry");
            return Err(Error::ForeignThread(thread.thread_id));
        }
        Ok(())
    }

    pub fn get(&self, thread_id: ThreadId) -> Option<ThreadHandle<K>> {
        if thread_id == 0 {
            return None;
        }
        sync::lock(&self.threads).get(thread_id - 1).cloned()
    }

    pub fn len(&self) -> usize {
        sync::lock(&self.threads).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const K: usize> Default for ThreadRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Every identity of a registry with capacity `K` must fit into the thread field of an epoch.
pub(crate) fn check_capacity<const K: usize>() -> Result<(), Error> {
    if K == 0 || K > MAX_THREAD_ID {
        error!(max_threads = K, "thread capacity does not fit in an epoch");
        return Err(Error::InvalidCapacity { max_threads: K });
    }
    Ok(())
}

/// Lock two different threads' states in ascending identity order, returning the guards in
/// argument order.
fn lock_pair<'a, const K: usize>(
    parent: &'a ThreadHandle<K>,
    child: &'a ThreadHandle<K>,
) -> Result<(MutexGuard<'a, ThreadState<K>>, MutexGuard<'a, ThreadState<K>>), Error> {
    if parent.thread_id == child.thread_id {
        return Err(Error::SelfSynchronization(parent.thread_id));
    }
    if parent.thread_id < child.thread_id {
        let parent_state = parent.lock();
        let child_state = child.lock();
        Ok((parent_state, child_state))
    } else {
        let child_state = child.lock();
        let parent_state = parent.lock();
        Ok((parent_state, child_state))
    }
}

#[cfg(all(test, not(feature = "shuttle"), not(loom)))]
mod tests {
    use crate::clock::{Epoch, VectorClock};
    use crate::err::Error;
    use crate::thread::{ThreadHandle, ThreadRegistry};
    use test_log::test;

    #[test]
    fn test_identities_are_assigned_from_one() {
        let registry: ThreadRegistry<4> = ThreadRegistry::new();
        let ids: Vec<usize> = (0..3)
            .map(|_| registry.register_thread().unwrap().thread_id())
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.get(2).unwrap().thread_id(), 2);
        assert!(registry.get(0).is_none());
        assert!(registry.get(4).is_none());
    }

    #[test]
    fn test_capacity_past_epoch_field_is_rejected() {
        let registry: ThreadRegistry<256> = ThreadRegistry::new();
        assert_eq!(
            registry.register_thread().unwrap_err(),
            Error::InvalidCapacity { max_threads: 256 }
        );
        assert!(registry.is_empty());

        let registry: ThreadRegistry<255> = ThreadRegistry::new();
        let last = (0..255)
            .map(|_| registry.register_thread().unwrap())
            .last()
            .unwrap();
        assert_eq!(last.thread_id(), 255);
        assert_eq!(last.snapshot().epoch().thread_id(), 255);
        assert_ne!(last.snapshot().epoch(), Epoch::EMPTY);
        assert_eq!(
            registry.register_thread().unwrap_err(),
            Error::CapacityExceeded { max_threads: 255 }
        );
    }

    #[test]
    fn test_handles_from_another_registry_are_rejected() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let other: ThreadRegistry<2> = ThreadRegistry::new();
        let parent = registry.register_thread().unwrap();
        let child = registry.register_thread().unwrap();
        let stranger = other.register_thread().unwrap();

        assert_eq!(registry.fork(&parent, &stranger), Err(Error::ForeignThread(1)));
        assert_eq!(other.join(&stranger, &child), Err(Error::ForeignThread(2)));
        assert_eq!(registry.exit(&stranger), Err(Error::ForeignThread(1)));
        assert!(registry.ensure_registered(&child).is_ok());
        assert!(other.ensure_registered(&stranger).is_ok());
        // the rejected fork left both clocks untouched
        assert_eq!(stranger.snapshot().clock(), &VectorClock::from([1, 0]));
        assert_eq!(parent.snapshot().clock(), &VectorClock::from([1, 0]));
    }

    #[test]
    fn test_fresh_thread_only_knows_its_first_event() {
        let registry: ThreadRegistry<3> = ThreadRegistry::new();
        registry.register_thread().unwrap();
        let second: ThreadHandle<3> = registry.register_thread().unwrap();

        let state = second.snapshot();
        assert_eq!(state.clock(), &VectorClock::from([0, 1, 0]));
        assert_eq!(state.epoch(), Epoch::construct(2, 1));
        assert!(!state.has_exited());
    }

    #[test]
    fn test_registering_past_capacity_fails() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        registry.register_thread().unwrap();
        registry.register_thread().unwrap();
        assert_eq!(
            registry.register_thread().unwrap_err(),
            Error::CapacityExceeded { max_threads: 2 }
        );
        // exiting does not free a slot
        registry.exit(&registry.get(1).unwrap()).unwrap();
        assert!(registry.register_thread().is_err());
    }

    #[test]
    fn test_fork_orders_child_after_parent() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let parent = registry.register_thread().unwrap();
        let child = registry.register_thread().unwrap();

        registry.fork(&parent, &child).unwrap();

        let parent_state = parent.snapshot();
        let child_state = child.snapshot();
        assert_eq!(child_state.clock(), &VectorClock::from([1, 1]));
        assert_eq!(parent_state.clock(), &VectorClock::from([2, 0]));
        assert_eq!(parent_state.epoch(), Epoch::construct(1, 2));
        // the child has seen the parent's pre-fork epoch but not its post-fork one
        assert_eq!(Epoch::construct(1, 1).happened_before(child_state.clock()), Ok(true));
        assert_eq!(parent_state.epoch().happened_before(child_state.clock()), Ok(false));
    }

    #[test]
    fn test_join_orders_parent_after_child() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let parent = registry.register_thread().unwrap();
        let child = registry.register_thread().unwrap();
        registry.fork(&parent, &child).unwrap();

        let child_epoch_before_join = child.snapshot().epoch();
        registry.join(&parent, &child).unwrap();

        let parent_state = parent.snapshot();
        assert_eq!(child_epoch_before_join.happened_before(parent_state.clock()), Ok(true));
        assert_eq!(child.snapshot().epoch(), Epoch::construct(2, 2));
        assert_eq!(parent_state.clock(), &VectorClock::from([2, 1]));
    }

    #[test]
    fn test_join_in_reverse_identity_order() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let child = registry.register_thread().unwrap();
        let parent = registry.register_thread().unwrap();

        registry.join(&parent, &child).unwrap();
        assert_eq!(parent.snapshot().clock(), &VectorClock::from([1, 1]));
    }

    #[test]
    fn test_thread_cannot_synchronize_with_itself() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let thread = registry.register_thread().unwrap();
        assert_eq!(
            registry.fork(&thread, &thread.clone()).unwrap_err(),
            Error::SelfSynchronization(1)
        );
        assert_eq!(
            registry.join(&thread, &thread).unwrap_err(),
            Error::SelfSynchronization(1)
        );
    }

    #[test]
    fn test_exited_thread_cannot_fork_or_exit_again() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let parent = registry.register_thread().unwrap();
        let child = registry.register_thread().unwrap();
        registry.exit(&parent).unwrap();

        assert_eq!(registry.fork(&parent, &child).unwrap_err(), Error::ThreadExited(1));
        assert_eq!(registry.exit(&parent).unwrap_err(), Error::ThreadExited(1));
        assert!(parent.snapshot().has_exited());
    }

    #[test]
    fn test_parent_can_join_exited_child() {
        let registry: ThreadRegistry<2> = ThreadRegistry::new();
        let parent = registry.register_thread().unwrap();
        let child = registry.register_thread().unwrap();
        registry.exit(&child).unwrap();
        assert!(registry.join(&parent, &child).is_ok());
    }
}
