//! Fan-out/fan-in timing of concurrent work.
//!
//! A measured iteration launches one worker per assignment and blocks on a
//! [`CompletionLatch`] until every worker has signalled. Each worker owns a
//! [`CompletionSignal`] that releases the latch when dropped, so a worker
//! signals on every exit path, including a logged error or a panic. There is
//! no timeout: a worker that never returns stalls the iteration.

use std::{cell::RefCell, sync::Arc, thread};

use parking_lot::{Condvar, Mutex};

use crate::{measure::measure, stats::SampleSet};

/// Disjoint key space assigned to one worker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerPartition {
    pub index: usize,
    pub prefix: String,
}

impl WorkerPartition {
    pub fn new(index: usize, base: &str) -> Self {
        Self {
            index,
            prefix: format!("{base}{index}"),
        }
    }

    pub fn key(&self, item: usize) -> String {
        format!("{}_{item}", self.prefix)
    }

    pub fn keys(&self, count: usize) -> Vec<String> {
        (0..count).map(|item| self.key(item)).collect()
    }
}

/// Partitions for `workers` workers, prefixed `{base}0`, `{base}1`, ...
pub fn partitions(workers: usize, base: &str) -> Vec<WorkerPartition> {
    (0..workers)
        .map(|index| WorkerPartition::new(index, base))
        .collect()
}

/// Counting rendezvous released by exactly one signal per launched worker.
#[derive(Debug)]
pub struct CompletionLatch {
    remaining: Mutex<usize>,
    released: Condvar,
}

impl CompletionLatch {
    pub fn new(count: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        })
    }

    pub fn signal(latch: &Arc<Self>) -> CompletionSignal {
        CompletionSignal {
            latch: Arc::clone(latch),
        }
    }

    pub fn remaining(&self) -> usize {
        *self.remaining.lock()
    }

    /// Blocks until the count reaches zero.
    pub fn wait(&self) {
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            self.released.wait(&mut remaining);
        }
    }

    fn release(&self) {
        let mut remaining = self.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.released.notify_all();
        }
    }
}

/// Releases its latch once, when dropped.
#[derive(Debug)]
pub struct CompletionSignal {
    latch: Arc<CompletionLatch>,
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        self.latch.release();
    }
}

/// Runs `work` once per assignment, each on its own thread, and returns
/// after all of them have signalled completion.
///
/// Assignments are moved into their worker, so a per-worker handle (for
/// example a cloned connection) is never shared between threads. Returns
/// the number of completions received.
pub fn fan_out<T, F>(assignments: Vec<T>, work: &F) -> usize
where
    T: Send,
    F: Fn(T) + Sync,
{
    let workers = assignments.len();
    let latch = CompletionLatch::new(workers);
    thread::scope(|scope| {
        for assignment in assignments {
            let signal = CompletionLatch::signal(&latch);
            scope.spawn(move || {
                let _signal = signal;
                work(assignment);
            });
        }
        latch.wait();
    });
    workers
}

/// Times fan-out iterations; `prepare` builds the assignments before each
/// iteration, outside the timed interval.
pub fn measure_fan_out<T, P, F>(
    mut prepare: P,
    work: F,
    warmup: usize,
    iterations: usize,
) -> SampleSet
where
    T: Send,
    P: FnMut() -> Vec<T>,
    F: Fn(T) + Sync,
{
    let pending: RefCell<Vec<T>> = RefCell::new(Vec::new());
    measure(
        Some(&mut || *pending.borrow_mut() = prepare()),
        &mut || {
            let assignments = pending.take();
            fan_out(assignments, &work);
        },
        None,
        warmup,
        iterations,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_releases_on_drop() {
        let latch = CompletionLatch::new(2);
        drop(CompletionLatch::signal(&latch));
        assert_eq!(latch.remaining(), 1);
        drop(CompletionLatch::signal(&latch));
        assert_eq!(latch.remaining(), 0);
        latch.wait();
    }

    #[test]
    fn test_partition_keys_are_prefixed() {
        let part = WorkerPartition::new(3, "w");
        assert_eq!(part.keys(2), vec!["w3_0".to_string(), "w3_1".to_string()]);
    }
}
