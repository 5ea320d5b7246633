//! The FastTrack rule: a location remembers only the epoch of its last write and, while its reads
//! are totally ordered, the epoch of its last read. A read vector clock is materialized only once
//! two threads have read the location without ordering between them.
//!
//! | rule            | condition                                    | cost |
//! |-----------------|----------------------------------------------|------|
//! | read same epoch | `R == e`                                     | O(1) |
//! | read exclusive  | `R` is an epoch ordered before the reader    | O(1) |
//! | read share      | `R` is an epoch unordered with the reader    | O(K) |
//! | read shared     | `R == SHARED`                                | O(1) |
//! | write same epoch| `W == e`                                     | O(1) |
//! | write exclusive | `R` is an epoch                              | O(1) |
//! | write shared    | `R == SHARED`                                | O(K) |

use tracing::{debug, trace};

use crate::clock::{Epoch, VectorClock};
use crate::config::Config;
use crate::detector::{Access, AccessRule};
use crate::err::Error;
use crate::race::{RaceEvent, RaceKind, RaceRecord};
use crate::shadow::ShadowEntry;
use crate::thread::ThreadState;
use crate::types::{convert_thread_index_to_thread_id, AccessKind, Address, ThreadId};

/// The last write epoch and the read state of a location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EpochEntry<const K: usize> {
    address: Address,

    /// `W`: the epoch of the last write, [Epoch::EMPTY] until the first one.
    write: Epoch,

    /// `R`: the epoch of the last read, or [Epoch::SHARED] when the reads are tracked by
    /// `read_clock` instead.
    read: Epoch,

    /// `Rvc`: the clock of every thread's last read since the reads became shared. All zero
    /// whenever `read` is not [Epoch::SHARED].
    read_clock: VectorClock<K>,

    races: RaceRecord,
}

impl<const K: usize> EpochEntry<K> {
    pub fn write_epoch(&self) -> Epoch {
        self.write
    }

    pub fn read_epoch(&self) -> Epoch {
        self.read
    }

    /// The read vector clock, only while the reads are shared.
    pub fn read_clock(&self) -> Option<&VectorClock<K>> {
        if self.read.is_shared() {
            Some(&self.read_clock)
        } else {
            None
        }
    }

    fn read(
        &mut self,
        thread: &ThreadState<K>,
        address: Address,
        config: &Config,
    ) -> Result<u64, Error> {
        let epoch: Epoch = thread.epoch();
        if self.read == epoch {
            trace!(address, %epoch, "read same epoch");
            return Ok(0);
        }

        let mut counted: u64 = 0;
        if !self.write.happened_before(thread.clock())? {
            let prior_thread: ThreadId = self.write.thread_id();
            counted += self.report(RaceKind::WriteRead, address, thread, prior_thread, config);
        }

        if self.read.is_shared() {
            self.read_clock.set(thread.thread_id(), epoch.clock())?;
            trace!(address, %epoch, "read shared");
        } else if self.read.happened_before(thread.clock())? {
            self.read = epoch;
            trace!(address, %epoch, "read exclusive");
        } else {
            let previous: Epoch = self.read;
            self.read_clock.reset();
            self.read_clock.set(previous.thread_id(), previous.clock())?;
            self.read_clock.set(thread.thread_id(), epoch.clock())?;
            self.read = Epoch::SHARED;
            debug!(address, %previous, %epoch, "read share");
        }
        Ok(counted)
    }

    fn write(
        &mut self,
        thread: &ThreadState<K>,
        address: Address,
        config: &Config,
    ) -> Result<u64, Error> {
        let epoch: Epoch = thread.epoch();
        if self.write == epoch {
            trace!(address, %epoch, "write same epoch");
            return Ok(0);
        }

        let mut counted: u64 = 0;
        if !self.write.happened_before(thread.clock())? {
            let prior_thread: ThreadId = self.write.thread_id();
            counted += self.report(RaceKind::WriteWrite, address, thread, prior_thread, config);
        }

        if self.read.is_shared() {
            let mut unordered_readers: Vec<ThreadId> = Vec::new();
            for (thread_index, (read, known)) in self
                .read_clock
                .as_slice()
                .iter()
                .zip(thread.clock().as_slice())
                .enumerate()
            {
                if read > known {
                    unordered_readers.push(convert_thread_index_to_thread_id(thread_index));
                }
            }
            for prior_thread in unordered_readers {
                counted += self.report(RaceKind::ReadWrite, address, thread, prior_thread, config);
            }

            self.read_clock.reset();
            self.read = Epoch::EMPTY;
            trace!(address, %epoch, "write shared");
        } else {
            if !self.read.happened_before(thread.clock())? {
                let prior_thread: ThreadId = self.read.thread_id();
                counted += self.report(RaceKind::ReadWrite, address, thread, prior_thread, config);
            }
            trace!(address, %epoch, "write exclusive");
        }

        self.write = epoch;
        Ok(counted)
    }

    fn report(
        &mut self,
        kind: RaceKind,
        address: Address,
        thread: &ThreadState<K>,
        prior_thread: ThreadId,
        config: &Config,
    ) -> u64 {
        let event = RaceEvent {
            kind,
            address,
            thread: thread.thread_id(),
            prior_thread,
        };
        self.races.report(event, config)
    }
}

impl<const K: usize> ShadowEntry for EpochEntry<K> {
    fn new(address: Address) -> Self {
        Self {
            address,
            write: Epoch::EMPTY,
            read: Epoch::EMPTY,
            read_clock: VectorClock::new(),
            races: RaceRecord::default(),
        }
    }

    fn address(&self) -> Address {
        self.address
    }

    fn races(&self) -> &RaceRecord {
        &self.races
    }
}

/// Selects the FastTrack epoch rule for a [Detector](crate::Detector).
#[derive(Clone, Copy, Debug, Default)]
pub struct FastTrack;

impl<const K: usize> AccessRule<K> for FastTrack {
    type Entry = EpochEntry<K>;

    fn check(
        entry: &mut EpochEntry<K>,
        thread: &mut ThreadState<K>,
        access: Access,
        config: &Config,
    ) -> Result<u64, Error> {
        match access.kind {
            AccessKind::Read => entry.read(thread, access.address, config),
            AccessKind::Write => entry.write(thread, access.address, config),
        }
    }
}
