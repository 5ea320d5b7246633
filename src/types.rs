/// A number uniquely identifying a thread observed by a detector.
///
/// ThreadIds are assigned incrementally starting from 1. Otherwise, we would be unable to tell the
/// difference between thread 0 and an epoch with no thread attached.
pub type ThreadId = usize;

/// The position of a thread's own coordinate in a [VectorClock](crate::VectorClock).
pub(crate) type ThreadIndex = usize;

/// A per-thread logical event counter, one coordinate of a vector clock.
pub type ClockValue = u64;

/// An opaque key identifying a monitored memory location or lock, usually derived from a pointer.
pub type Address = usize;

/// The thread identity stored in an epoch which was never produced by a real thread.
pub(crate) const NO_THREAD: ThreadId = 0;

/// The number of most significant bits of an epoch which hold a [ThreadId].
pub(crate) const THREAD_ID_BIT_LENGTH: u32 = 8;

/// The number of least significant bits of an epoch which hold a [ClockValue].
pub(crate) const CLOCK_BIT_LENGTH: u32 = u64::BITS - THREAD_ID_BIT_LENGTH;

/// The mask to AND with an epoch in order to extract the clock value.
pub(crate) const CLOCK_MASK: u64 = !(u64::MAX << CLOCK_BIT_LENGTH);

/// The largest thread identity which fits into the thread field of an epoch.
pub const MAX_THREAD_ID: ThreadId = (1 << THREAD_ID_BIT_LENGTH) - 1;

/// The maximum number of threads a detector supports unless configured otherwise.
pub const DEFAULT_MAX_THREADS: usize = 64;

pub(crate) fn convert_thread_id_to_thread_index(thread_id: ThreadId) -> ThreadIndex {
    thread_id - 1
}

pub(crate) fn convert_thread_index_to_thread_id(thread_index: ThreadIndex) -> ThreadId {
    thread_index + 1
}

/// The kind of a single monitored access.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn is_write(self) -> bool {
        matches!(self, AccessKind::Write)
    }
}

impl core::fmt::Display for AccessKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?}")
    }
}
