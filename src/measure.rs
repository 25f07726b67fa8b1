//! Repeated timed execution of caller-supplied closures.
//!
//! Each entry point runs an unmeasured warmup phase followed by a measured
//! phase and returns one [`SampleSet`] sample (wall-clock nanoseconds) per
//! measured iteration. Closures are called as-is: a panic propagates to the
//! caller and an error a closure swallows still counts as a sample, so
//! closures are expected to log their own failures.

use std::time::Instant;

use crate::stats::SampleSet;

fn repeat<F: FnMut()>(mut f: F, count: usize) {
    for _ in 0..count {
        f();
    }
}

fn timed<F: FnMut() + ?Sized>(f: &mut F, samples: &mut SampleSet) {
    let start = Instant::now();
    f();
    samples.add(start.elapsed().as_nanos() as f64);
}

/// Runs `f` `warmup` times untimed, then `iterations` times timed.
pub fn measure_simple<F: FnMut()>(mut f: F, warmup: usize, iterations: usize) -> SampleSet {
    repeat(&mut f, warmup);
    let mut samples = SampleSet::with_capacity(iterations);
    repeat(|| timed(&mut f, &mut samples), iterations);
    samples
}

/// Runs `pre -> body -> post` per iteration, timing only `body`.
///
/// `pre` and `post` are optional; when present each is invoked exactly
/// `warmup + iterations` times, as is `body`.
///
/// ```
/// use metabench::measure::measure;
///
/// let log = std::cell::RefCell::new(Vec::new());
/// let samples = measure(
///     Some(&mut || log.borrow_mut().push("pre")),
///     &mut || log.borrow_mut().push("body"),
///     Some(&mut || log.borrow_mut().push("post")),
///     1,
///     1,
/// );
/// assert_eq!(samples.len(), 1);
/// assert_eq!(log.borrow().len(), 6);
/// ```
pub fn measure(
    mut pre: Option<&mut dyn FnMut()>,
    body: &mut dyn FnMut(),
    mut post: Option<&mut dyn FnMut()>,
    warmup: usize,
    iterations: usize,
) -> SampleSet {
    let mut samples = SampleSet::with_capacity(iterations);
    for _ in 0..warmup {
        if let Some(pre) = pre.as_deref_mut() {
            pre();
        }
        body();
        if let Some(post) = post.as_deref_mut() {
            post();
        }
    }
    for _ in 0..iterations {
        if let Some(pre) = pre.as_deref_mut() {
            pre();
        }
        timed(&mut *body, &mut samples);
        if let Some(post) = post.as_deref_mut() {
            post();
        }
    }
    samples
}
