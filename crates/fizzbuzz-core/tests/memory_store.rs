// crates/fizzbuzz-core/tests/memory_store.rs
// ============================================================================
// Module: In-Memory Stats Store Tests
// Description: Tie-break, counting and concurrency checks for the map store.
// Purpose: Validate most-frequent selection and lossless concurrent increments.
// Dependencies: fizzbuzz-core
// ============================================================================

//! ## Overview
//! Covers the empty result, the tie-break ordering, the shared wrapper,
//! cancellation and concurrent increments from many threads.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;
use std::thread;

use fizzbuzz_core::CancelToken;
use fizzbuzz_core::Configuration;
use fizzbuzz_core::MemoryStatsStore;
use fizzbuzz_core::MostFrequent;
use fizzbuzz_core::SharedStatsStore;
use fizzbuzz_core::StatsError;
use fizzbuzz_core::StatsStore;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn small() -> Configuration {
    Configuration::new(0, 0, 0, "", "")
}

fn big() -> Configuration {
    Configuration::new(0, 0, 0, "", "a")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn empty_store_reports_zero_without_config() {
    let store = MemoryStatsStore::new();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::empty());
}

#[test]
fn tie_returns_smaller_configuration() {
    let store = MemoryStatsStore::new();
    let a = Configuration::new(13, 3, 4, "fizz", "buzz");
    let b = Configuration::new(14, 3, 4, "fizz", "buzz");
    store.increment(&a).unwrap();
    store.increment(&b).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(1, a));
}

#[test]
fn higher_count_wins_over_smaller_configuration() {
    let store = MemoryStatsStore::new();
    let a = Configuration::new(1, 1, 1, "a", "a");
    let b = Configuration::new(2, 1, 1, "a", "a");
    store.increment(&a).unwrap();
    store.increment(&a).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(2, a.clone()));
    store.increment(&b).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(2, a));
    store.increment(&b).unwrap();
    store.increment(&b).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(3, b));
}

#[test]
fn smaller_configuration_takes_over_on_tie() {
    let store = MemoryStatsStore::new();
    store.increment(&big()).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(1, big()));
    store.increment(&small()).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(1, small()));
    store.increment(&small()).unwrap();
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::new(2, small()));
}

#[test]
fn repeated_queries_are_deterministic() {
    let store = MemoryStatsStore::new();
    for limit in (0 .. 50).rev() {
        store.increment(&Configuration::new(limit, 2, 3, "x", "y")).unwrap();
    }
    let first = store.most_frequent().unwrap();
    for _ in 0 .. 20 {
        assert_eq!(store.most_frequent().unwrap(), first);
    }
    assert_eq!(first, MostFrequent::new(1, Configuration::new(0, 2, 3, "x", "y")));
    assert_eq!(store.len().unwrap(), 50);
}

#[test]
fn shared_store_forwards_to_backend() {
    let backend = MemoryStatsStore::new();
    let shared = SharedStatsStore::from_store(backend.clone());
    shared.increment(&small()).unwrap();
    assert_eq!(backend.count_of(&small()).unwrap(), 1);
    assert_eq!(shared.clone().most_frequent().unwrap(), MostFrequent::new(1, small()));
}

#[test]
fn cancelled_operations_leave_state_unchanged() {
    let store = MemoryStatsStore::new();
    let token = CancelToken::new();
    token.cancel();
    assert!(matches!(store.increment_with(&small(), &token), Err(StatsError::Cancelled)));
    assert!(matches!(store.most_frequent_with(&token), Err(StatsError::Cancelled)));
    assert_eq!(store.most_frequent().unwrap(), MostFrequent::empty());
}

#[test]
fn concurrent_increments_are_not_lost() {
    let store = Arc::new(MemoryStatsStore::new());
    let threads = 8;
    let per_thread = 500;
    let mut handles = Vec::new();
    for worker in 0 .. threads {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for round in 0 .. per_thread {
                store.increment(&Configuration::default()).unwrap();
                store.increment(&Configuration::new(worker, 1, 1, "", "")).unwrap();
                if round % 50 == 0 {
                    store.most_frequent().unwrap();
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let expected = u64::try_from(threads * per_thread).unwrap();
    assert_eq!(store.count_of(&Configuration::default()).unwrap(), expected);
    assert_eq!(
        store.most_frequent().unwrap(),
        MostFrequent::new(expected, Configuration::default())
    );
}
