use displaydoc::Display;
use tracing::{trace, warn};

use crate::config::{Config, ReportingPolicy};
use crate::types::{AccessKind, Address, ThreadId};

/// Which pair of accesses raced, named prior access first.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum RaceKind {
    /// write-write
    WriteWrite,
    /// write-read
    WriteRead,
    /// read-write
    ReadWrite,
}

impl RaceKind {
    /// The kind of race two unordered accesses would form, or `None` if both are reads.
    pub fn between(prior: AccessKind, current: AccessKind) -> Option<RaceKind> {
        match (prior, current) {
            (AccessKind::Write, AccessKind::Write) => Some(RaceKind::WriteWrite),
            (AccessKind::Write, AccessKind::Read) => Some(RaceKind::WriteRead),
            (AccessKind::Read, AccessKind::Write) => Some(RaceKind::ReadWrite),
            (AccessKind::Read, AccessKind::Read) => None,
        }
    }
}

/// {kind} race on address {address} between thread {prior_thread} and thread {thread}
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub struct RaceEvent {
    pub kind: RaceKind,
    pub address: Address,
    /// The thread performing the access which exposed the race.
    pub thread: ThreadId,
    /// The thread whose earlier access is not ordered before the current one.
    pub prior_thread: ThreadId,
}

/// The races observed on one location.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RaceRecord {
    count: u64,
    events: Vec<RaceEvent>,
}

impl RaceRecord {
    pub fn count(&self) -> u64 {
        self.count
    }

    /// The first races on this location, up to [Config::max_recorded_events] of them.
    pub fn events(&self) -> &[RaceEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record `event` according to `config` and return how many races were counted (0 or 1).
    pub(crate) fn report(&mut self, event: RaceEvent, config: &Config) -> u64 {
        if config.reporting == ReportingPolicy::FirstPerLocation && self.count > 0 {
            trace!(%event, "suppressed repeated race");
            return 0;
        }

        self.count += 1;
        warn!(
            address = event.address,
            kind = %event.kind,
            thread = event.thread,
            prior_thread = event.prior_thread,
            "data race detected"
        );
        if self.events.len() < config.max_recorded_events {
            self.events.push(event);
        }
        1
    }
}
