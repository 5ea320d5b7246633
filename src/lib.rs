//! A dynamic data-race detector for programs whose threads, locks and shared memory accesses are
//! reported to it as they happen.
//!
//! Happens-before is tracked with vector clocks: every thread carries one, lock release and
//! acquire carry clocks between threads, and so do fork and join. Two accesses to the same
//! address race when at least one of them is a write and neither happened before the other.
//!
//! Two rules are available, selected by the type parameter of [Detector]:
//!
//! - [Precise] keeps the full clock of the last access to each location ([PreciseDetector]).
//! - [FastTrack] keeps a single epoch for the last write and, as long as reads are ordered, for
//!   the last read ([EpochDetector]). Most accesses cost O(1).
//!
//! ```
//! use memrace::{EpochDetector, Monitored};
//!
//! let detector: EpochDetector<4> = EpochDetector::new().unwrap();
//! let main = detector.on_thread_start().unwrap();
//! let worker = detector.on_thread_start().unwrap();
//! let counter: Monitored<u64> = Monitored::new(0);
//!
//! detector.on_thread_fork(&main, &worker).unwrap();
//! let seen = detector.on_read(&counter, &worker).unwrap();
//! detector.on_write(&counter, &worker, seen + 1).unwrap();
//! // the main thread never joined the worker
//! assert_eq!(detector.on_read(&counter, &main).unwrap(), 1);
//!
//! assert_eq!(detector.race_count(counter.address()), 1);
//! ```

pub use crate::clock::{Epoch, VectorClock};
pub use crate::config::{Config, ReportingPolicy};
pub use crate::detector::{
    Access, AccessRule, Detector, EpochDetector, EpochEntry, FastTrack, Precise, PreciseDetector,
    PreciseEntry,
};
pub use crate::err::{Error, FatalError};
pub use crate::lock::{LockState, LockStore};
pub use crate::monitored::Monitored;
pub use crate::race::{RaceEvent, RaceKind, RaceRecord};
pub use crate::shadow::{ShadowEntry, ShadowMemory};
pub use crate::thread::{ThreadHandle, ThreadRegistry, ThreadState};
pub use crate::types::{
    AccessKind, Address, ClockValue, ThreadId, DEFAULT_MAX_THREADS, MAX_THREAD_ID,
};

mod clock;
mod config;
mod detector;
pub mod err;
mod lock;
mod monitored;
mod race;
mod shadow;
mod sync;
mod thread;
mod types;
