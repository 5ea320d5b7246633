//! The full vector clock rule: every access snapshots the accessing thread's whole clock, and two
//! accesses race iff their snapshots are concurrent.
//!
//! Every access is a distinct event in its thread's history, including a second read in the same
//! epoch, so the rule needs no fast path and no special read tracking. Each access costs O(K).

use tracing::trace;

use crate::clock::VectorClock;
use crate::config::Config;
use crate::detector::{Access, AccessRule};
use crate::err::Error;
use crate::race::{RaceEvent, RaceKind, RaceRecord};
use crate::shadow::ShadowEntry;
use crate::thread::ThreadState;
use crate::types::{AccessKind, Address, ThreadId};

/// The last access to a location, with the complete clock of the thread that performed it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PreciseEntry<const K: usize> {
    address: Address,
    last_accessor: Option<ThreadId>,
    last_was_write: bool,
    last_access: VectorClock<K>,
    races: RaceRecord,
}

impl<const K: usize> PreciseEntry<K> {
    /// The thread of the last access, or `None` if the location was never accessed.
    pub fn last_accessor(&self) -> Option<ThreadId> {
        self.last_accessor
    }

    pub fn last_access_kind(&self) -> AccessKind {
        if self.last_was_write {
            AccessKind::Write
        } else {
            AccessKind::Read
        }
    }

    /// The clock of the last accessor as of the last access.
    pub fn last_access(&self) -> &VectorClock<K> {
        &self.last_access
    }
}

impl<const K: usize> ShadowEntry for PreciseEntry<K> {
    fn new(address: Address) -> Self {
        Self {
            address,
            last_accessor: None,
            last_was_write: false,
            last_access: VectorClock::new(),
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

/// Selects the full vector clock rule for a [Detector](crate::Detector).
#[derive(Clone, Copy, Debug, Default)]
pub struct Precise;

impl<const K: usize> AccessRule<K> for Precise {
    type Entry = PreciseEntry<K>;

    fn check(
        entry: &mut PreciseEntry<K>,
        thread: &mut ThreadState<K>,
        access: Access,
        config: &Config,
    ) -> Result<u64, Error> {
        thread.tick()?;

        let mut counted: u64 = 0;
        if let Some(prior_thread) = entry.last_accessor {
            let race_kind: Option<RaceKind> =
                RaceKind::between(entry.last_access_kind(), access.kind);
            if let Some(kind) = race_kind {
                if prior_thread != thread.thread_id()
                    && entry.last_access.concurrent(thread.clock())
                {
                    let event = RaceEvent {
                        kind,
                        address: access.address,
                        thread: thread.thread_id(),
                        prior_thread,
                    };
                    counted += entry.races.report(event, config);
                }
            }
        }

        entry.last_accessor = Some(thread.thread_id());
        entry.last_was_write = access.kind.is_write();
        entry.last_access.clone_from(thread.clock());
        trace!(
            address = access.address,
            thread_id = thread.thread_id(),
            kind = %access.kind,
            epoch = %thread.epoch(),
            "recorded access"
        );
        Ok(counted)
    }
}
