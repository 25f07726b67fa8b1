use std::{
    cell::Cell,
    collections::HashSet,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use metabench::{
    CompletionLatch, WorkerPartition, fan_out, measure_fan_out,
    concurrent::{CompletionSignal, partitions},
};
use parking_lot::Mutex;

/// Shared key store that records every key ever inserted and counts clashes.
#[derive(Default)]
struct KeyStore {
    keys: Mutex<HashSet<String>>,
    collisions: AtomicUsize,
}

impl KeyStore {
    fn insert(&self, key: String) {
        if !self.keys.lock().insert(key) {
            self.collisions.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[test]
fn test_fan_out_workers_use_disjoint_keys() {
    let store = KeyStore::default();
    let completed = fan_out(partitions(4, "w"), &|part: WorkerPartition| {
        for key in part.keys(10) {
            store.insert(key);
        }
    });
    assert_eq!(completed, 4);
    assert_eq!(store.collisions.load(Ordering::SeqCst), 0);
    let keys = store.keys.lock();
    assert_eq!(keys.len(), 40);
    for worker in 0..4 {
        for item in 0..10 {
            assert!(keys.contains(&format!("w{worker}_{item}")));
        }
    }
}

#[test]
fn test_fan_out_with_no_assignments_returns_immediately() {
    let completed = fan_out(Vec::<usize>::new(), &|_: usize| {});
    assert_eq!(completed, 0);
}

#[test]
fn test_fan_out_waits_for_every_worker() {
    let finished = AtomicUsize::new(0);
    fan_out(vec![5u64, 20, 40], &|millis: u64| {
        thread::sleep(Duration::from_millis(millis));
        finished.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(finished.load(Ordering::SeqCst), 3);
}

#[test]
fn test_measure_fan_out_prepares_every_iteration() {
    let prepared = Cell::new(0usize);
    let runs = AtomicUsize::new(0);
    let samples = measure_fan_out(
        || {
            prepared.set(prepared.get() + 1);
            partitions(3, "w")
        },
        |_part: WorkerPartition| {
            runs.fetch_add(1, Ordering::SeqCst);
        },
        2,
        5,
    );
    assert_eq!(samples.len(), 5);
    assert_eq!(prepared.get(), 7);
    assert_eq!(runs.load(Ordering::SeqCst), 21);
}

#[test]
fn test_measure_fan_out_times_slowest_worker() {
    let slow = Duration::from_millis(30);
    let samples = measure_fan_out(
        || vec![Duration::ZERO, Duration::from_millis(1), slow],
        thread::sleep,
        0,
        3,
    );
    assert!(samples.min().expect("min") >= slow.as_nanos() as f64);
}

#[test]
fn test_measure_fan_out_excludes_prepare_time() {
    let pause = Duration::from_millis(25);
    let samples = measure_fan_out(
        || {
            thread::sleep(pause);
            vec![(); 2]
        },
        |()| {},
        0,
        3,
    );
    assert!(samples.max().expect("max") < pause.as_nanos() as f64);
}

#[test]
fn test_latch_released_from_other_threads() {
    let latch = CompletionLatch::new(3);
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let signal = CompletionLatch::signal(&latch);
            thread::spawn(move || drop(signal))
        })
        .collect();
    latch.wait();
    assert_eq!(latch.remaining(), 0);
    for handle in handles {
        handle.join().expect("join");
    }
}

#[test]
fn test_panicking_worker_still_releases_latch() {
    fn fail_holding(signal: CompletionSignal) {
        let _signal = signal;
        panic!("worker failed");
    }
    let latch = CompletionLatch::new(1);
    let signal = CompletionLatch::signal(&latch);
    let handle = thread::spawn(move || fail_holding(signal));
    latch.wait();
    assert!(handle.join().is_err());
    assert_eq!(latch.remaining(), 0);
}

#[test]
#[should_panic]
fn test_fan_out_propagates_worker_panic_without_deadlock() {
    let survivors = AtomicUsize::new(0);
    fan_out(vec![0usize, 1, 2], &|index: usize| {
        if index == 1 {
            panic!("worker {index} failed");
        }
        survivors.fetch_add(1, Ordering::SeqCst);
    });
}
