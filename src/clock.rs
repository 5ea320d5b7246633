//! Vector clocks and packed epochs, and the happens-before relation between them.
//!
//! Nothing in this module locks. Callers serialize access to the clocks they mutate.

use core::fmt::{Display, Formatter};

use tracing::error;

use crate::err::FatalError;
use crate::types::{
    convert_thread_id_to_thread_index, ClockValue, ThreadId, CLOCK_BIT_LENGTH, CLOCK_MASK,
    MAX_THREAD_ID, NO_THREAD,
};

/// A number which stores a [ThreadId] in its 8 most significant bits and a [ClockValue] in the
/// remaining 56 bits, identifying a single point in one thread's history.
///
/// Two epochs from the same thread are ordered by their clock values. Epochs from different
/// threads can only be ordered against a [VectorClock] with [Epoch::happened_before].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct Epoch(u64);

impl Epoch {
    /// The epoch of a location which was never accessed: clock 1 of the reserved thread 0.
    pub const EMPTY: Epoch = Epoch::construct(NO_THREAD, 1);

    /// The marker stored as a read epoch when the reads of a location are tracked by a full
    /// vector clock instead.
    pub const SHARED: Epoch = Epoch::construct(NO_THREAD, 0);

    /// Pack `thread_id` and `clock` into one epoch.
    ///
    /// Both must fit their fields: `thread_id <= MAX_THREAD_ID` and `clock < 2^56`. Debug builds
    /// panic otherwise. The thread registry never hands out an identity that does not fit.
    pub const fn construct(thread_id: ThreadId, clock: ClockValue) -> Self {
        debug_assert!(thread_id <= MAX_THREAD_ID, "thread identity does not fit in an epoch");
        debug_assert!(clock <= CLOCK_MASK, "clock value does not fit in an epoch");
        Epoch(((thread_id as u64) << CLOCK_BIT_LENGTH) | (clock & CLOCK_MASK))
    }

    pub const fn thread_id(self) -> ThreadId {
        (self.0 >> CLOCK_BIT_LENGTH) as ThreadId
    }

    pub const fn clock(self) -> ClockValue {
        self.0 & CLOCK_MASK
    }

    pub const fn is_empty(self) -> bool {
        self.0 == Epoch::EMPTY.0
    }

    pub const fn is_shared(self) -> bool {
        self.0 == Epoch::SHARED.0
    }

    /// The packed representation.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether the event this epoch identifies is known to `clock`, i.e. `clock(self) <=
    /// clock[thread(self)]`.
    ///
    /// An epoch without a thread (never accessed) happened before everything.
    pub fn happened_before<const K: usize>(
        self,
        clock: &VectorClock<K>,
    ) -> Result<bool, FatalError> {
        let thread_id: ThreadId = self.thread_id();
        if thread_id == NO_THREAD {
            return Ok(true);
        }
        match clock.get(thread_id) {
            Some(known) => Ok(self.clock() <= known),
            None => {
                error!(epoch = %self, max_threads = K, "epoch names a thread outside the clock");
                Err(FatalError::EpochThreadOutOfRange(self, K))
            }
        }
    }
}

impl Display for Epoch {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        if self.is_shared() {
            write!(f, "shared")
        } else {
            write!(f, "{}@{}", self.clock(), self.thread_id())
        }
    }
}

/// A fixed-capacity vector clock with one coordinate for each of `K` threads.
///
/// Thread `t` owns coordinate `t - 1`. Coordinates only ever grow: by [VectorClock::merge] or by
/// the owning thread incrementing its own coordinate.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct VectorClock<const K: usize> {
    clocks: [ClockValue; K],
}

impl<const K: usize> VectorClock<K> {
    pub fn new() -> Self {
        Self { clocks: [0; K] }
    }

    /// The coordinate of `thread_id`, or `None` if this clock has no slot for it.
    pub fn get(&self, thread_id: ThreadId) -> Option<ClockValue> {
        if thread_id == NO_THREAD {
            return None;
        }
        self.clocks
            .get(convert_thread_id_to_thread_index(thread_id))
            .copied()
    }

    pub(crate) fn set(&mut self, thread_id: ThreadId, value: ClockValue) -> Result<(), FatalError> {
        let slot: &mut ClockValue = self.slot_mut(thread_id)?;
        *slot = value;
        Ok(())
    }

    /// Advance the coordinate of `thread_id` by one and return its new value.
    pub(crate) fn increment(&mut self, thread_id: ThreadId) -> Result<ClockValue, FatalError> {
        let slot: &mut ClockValue = self.slot_mut(thread_id)?;
        if *slot >= CLOCK_MASK {
            error!(thread_id, clock = *slot, "clock overflowed its epoch");
            return Err(FatalError::ClockOverflow {
                thread_id,
                clock: *slot,
            });
        }
        *slot += 1;
        Ok(*slot)
    }

    /// Pointwise maximum: afterwards `self` knows everything `other` knows.
    pub fn merge(&mut self, other: &VectorClock<K>) {
        for (mine, theirs) in self.clocks.iter_mut().zip(other.clocks.iter()) {
            if *mine < *theirs {
                *mine = *theirs;
            }
        }
    }

    /// True iff every coordinate of `self` is less than or equal to the same coordinate of
    /// `other`. Identical clocks happened before each other.
    pub fn happened_before(&self, other: &VectorClock<K>) -> bool {
        self.clocks
            .iter()
            .zip(other.clocks.iter())
            .all(|(mine, theirs)| mine <= theirs)
    }

    /// True iff neither clock happened before the other.
    pub fn concurrent(&self, other: &VectorClock<K>) -> bool {
        !self.happened_before(other) && !other.happened_before(self)
    }

    pub(crate) fn reset(&mut self) {
        self.clocks = [0; K];
    }

    pub fn as_slice(&self) -> &[ClockValue] {
        &self.clocks
    }

    fn slot_mut(&mut self, thread_id: ThreadId) -> Result<&mut ClockValue, FatalError> {
        let thread_index = match thread_id {
            NO_THREAD => None,
            _ => Some(convert_thread_id_to_thread_index(thread_id)),
        };
        match thread_index.and_then(|index| self.clocks.get_mut(index)) {
            Some(slot) => Ok(slot),
            None => {
                error!(thread_id, max_threads = K, "thread has no slot in the clock");
                Err(FatalError::ThreadOutOfRange {
                    thread_id,
                    max_threads: K,
                })
            }
        }
    }
}

impl<const K: usize> Default for VectorClock<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const K: usize> From<[ClockValue; K]> for VectorClock<K> {
    fn from(clocks: [ClockValue; K]) -> Self {
        Self { clocks }
    }
}
