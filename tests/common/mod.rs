#![allow(dead_code)]

use memrace::{AccessRule, Detector, Monitored, ThreadHandle};
use tracing::debug;

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::{Arc, Mutex};
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::{Arc, Mutex};
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use std::sync::{Arc, Mutex};
        pub(crate) use std::thread;
    }
}

/// What a counter run left behind.
#[derive(Debug)]
pub(crate) struct CounterOutcome {
    pub(crate) races: u64,
    pub(crate) total_races: u64,
    pub(crate) value: u64,
}

/// Fork `num_threads` workers from a main thread, have each increment one shared counter
/// `increments` times through the detector, then join them all and read the counter from main.
///
/// With `protected`, every increment happens while holding a real lock whose acquire and release
/// are reported to the detector.
pub(crate) fn counter_test<R, const K: usize>(
    num_threads: usize,
    increments: usize,
    protected: bool,
) -> CounterOutcome
where
    R: AccessRule<K> + 'static,
{
    let detector: Arc<Detector<R, K>> = Arc::new(Detector::new().unwrap());
    let counter: Arc<Monitored<u64>> = Arc::new(Monitored::new(0));
    let counter_lock: Arc<Mutex<()>> = Arc::new(Mutex::new(()));
    let lock_address: usize = &*counter_lock as *const Mutex<()> as usize;

    let main: ThreadHandle<K> = detector.on_thread_start().unwrap();

    let workers: Vec<(ThreadHandle<K>, thread::JoinHandle<()>)> = (0..num_threads)
        .map(|_| {
            let worker: ThreadHandle<K> = detector.on_thread_start().unwrap();
            detector.on_thread_fork(&main, &worker).unwrap();

            let detector = detector.clone();
            let counter = counter.clone();
            let counter_lock = counter_lock.clone();
            let this_thread = worker.clone();
            let handle: thread::JoinHandle<()> = thread::spawn(move || {
                for _ in 0..increments {
                    let guard = if protected {
                        let guard = counter_lock.lock().unwrap();
                        detector.on_lock_acquire(lock_address, &this_thread).unwrap();
                        Some(guard)
                    } else {
                        None
                    };

                    let seen: u64 = detector.on_read(&counter, &this_thread).unwrap();
                    detector.on_write(&counter, &this_thread, seen + 1).unwrap();

                    if let Some(guard) = guard {
                        detector.on_lock_release(lock_address, &this_thread).unwrap();
                        drop(guard);
                    }
                }
                detector.on_thread_exit(&this_thread).unwrap();
            });
            (worker, handle)
        })
        .collect();

    for (worker, handle) in workers {
        handle.join().expect("A worker panicked");
        detector.on_thread_join(&main, &worker).unwrap();
    }

    let value: u64 = detector.on_read(&counter, &main).unwrap();
    let outcome = CounterOutcome {
        races: detector.race_count(counter.address()),
        total_races: detector.total_races(),
        value,
    };
    debug!(?outcome, "counter finished");
    outcome
}

/// Unordered increments always race at least once, whatever the interleaving.
pub(crate) fn unprotected_counter_test<R, const K: usize>(num_threads: usize, increments: usize)
where
    R: AccessRule<K> + 'static,
{
    let outcome: CounterOutcome = counter_test::<R, K>(num_threads, increments, false);
    assert!(outcome.races > 0, "{outcome:?}");
    assert_eq!(outcome.races, outcome.total_races);
    assert!(outcome.value >= 1);
    assert!(outcome.value <= (num_threads * increments) as u64);
}

/// Increments under a lock never race and never lose an update.
pub(crate) fn protected_counter_test<R, const K: usize>(num_threads: usize, increments: usize)
where
    R: AccessRule<K> + 'static,
{
    let outcome: CounterOutcome = counter_test::<R, K>(num_threads, increments, true);
    assert_eq!(outcome.races, 0, "{outcome:?}");
    assert_eq!(outcome.total_races, 0);
    assert_eq!(outcome.value, (num_threads * increments) as u64);
}
