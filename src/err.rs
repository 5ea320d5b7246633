use crate::clock::Epoch;
use crate::types::ThreadId;
use displaydoc::Display;

/// Any error which can occur while observing a program.
///
/// Races are not errors. They are reported through [RaceRecord](crate::RaceRecord)s.
#[derive(Debug, Display, Eq, PartialEq)]
pub enum Error {
    /// A detector must support between 1 and 255 threads, but {max_threads} was configured.
    InvalidCapacity { max_threads: usize },

    /** All {max_threads} thread slots are already in use. Vector clocks cannot track any more
        threads without losing soundness.
    */
    CapacityExceeded { max_threads: usize },

    /// Thread {0} has already exited and can no longer be observed.
    ThreadExited(ThreadId),

    /// Thread {0} was registered with a different detector.
    ForeignThread(ThreadId),

    /// Thread {0} cannot fork or join itself.
    SelfSynchronization(ThreadId),

    /// An internal invariant was violated and detection is no longer sound: {0}
    Fatal(FatalError),
}

impl From<FatalError> for Error {
    fn from(fatal_error: FatalError) -> Self {
        Error::Fatal(fatal_error)
    }
}

impl std::error::Error for Error {}

/// An unrecoverable violation of the detector's own invariants.
#[derive(Debug, Display, Eq, PartialEq)]
pub enum FatalError {
    /// Thread {thread_id} has no slot in a vector clock tracking {max_threads} threads.
    ThreadOutOfRange {
        thread_id: ThreadId,
        max_threads: usize,
    },

    /// Epoch {0} names a thread which has no slot in a vector clock tracking {1} threads.
    EpochThreadOutOfRange(Epoch, usize),

    /// The clock of thread {thread_id} cannot advance past {clock} without overflowing its epoch.
    ClockOverflow { thread_id: ThreadId, clock: u64 },
}

impl std::error::Error for FatalError {}
