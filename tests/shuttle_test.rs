#![cfg(feature = "shuttle")]

mod common;

use memrace::{FastTrack, Precise};
use shuttle::scheduler::RandomScheduler;
use shuttle::{Config, PortfolioRunner};
use std::fs::File;
use std::io::Read;
use test_log::test;

fn portfolio(test: impl Fn() + Send + Sync + 'static) {
    let mut portfolio_runner = PortfolioRunner::new(true, Config::new());
    for _ in 0..8 {
        portfolio_runner.add(RandomScheduler::new(1000usize));
    }
    portfolio_runner.run(test);
}

#[test]
fn three_thread_unprotected_epoch_shuttle_test() {
    portfolio(|| {
        common::unprotected_counter_test::<FastTrack, 4>(3, 4);
    });
}

#[test]
fn three_thread_unprotected_precise_shuttle_test() {
    portfolio(|| {
        common::unprotected_counter_test::<Precise, 4>(3, 4);
    });
}

#[test]
fn three_thread_protected_epoch_shuttle_test() {
    portfolio(|| {
        common::protected_counter_test::<FastTrack, 4>(3, 4);
    });
}

#[test]
fn three_thread_protected_precise_shuttle_test() {
    portfolio(|| {
        common::protected_counter_test::<Precise, 4>(3, 4);
    });
}

/// Re-run a failing schedule printed by one of the tests above.
#[allow(dead_code)]
fn replay_test<const K: usize>(path_to_failing_iteration: &str, protected: bool) {
    let mut file: File = File::open(path_to_failing_iteration).unwrap();
    let mut replay_string: String = String::new();
    file.read_to_string(&mut replay_string).unwrap();
    shuttle::replay(
        move || {
            if protected {
                common::protected_counter_test::<FastTrack, K>(K - 1, 4);
            } else {
                common::unprotected_counter_test::<FastTrack, K>(K - 1, 4);
            }
        },
        &*replay_string,
    );
}
