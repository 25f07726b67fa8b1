//! Append-only sample collection with descriptive statistics.
//!
//! Samples are elapsed durations in nanoseconds. All statistics use the
//! population convention (variance divides by `n`), and the same convention
//! drives the outlier rule in [`SampleSet::sanitized`]. Statistics over an
//! empty set are `None` rather than zero so that a missing measurement can
//! never be mistaken for a fast one.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};

use crate::errors::MetabenchError;

/// Width of the sanitization band, in standard deviations around the mean.
pub const SANITIZE_SIGMAS: f64 = 2.0;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleSet {
    data: Vec<f64>,
}

impl SampleSet {
    pub fn new() -> Self {
        Self { data: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, value: f64) {
        self.data.push(value);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Samples in insertion order.
    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn mean(&self) -> Option<f64> {
        if self.data.is_empty() {
            return None;
        }
        Some(self.data.iter().sum::<f64>() / self.data.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.data.iter().copied().reduce(f64::max)
    }

    /// Population standard deviation.
    pub fn stdev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = self
            .data
            .iter()
            .map(|v| {
                let delta = v - mean;
                delta * delta
            })
            .sum::<f64>()
            / self.data.len() as f64;
        Some(variance.sqrt())
    }

    /// Standard deviation as a percentage of the mean.
    pub fn relative_error(&self) -> Option<f64> {
        let mean = self.mean()?;
        if mean == 0.0 {
            return None;
        }
        Some(self.stdev()? * 100.0 / mean)
    }

    /// Returns a new set without the samples outside `mean ± 2σ`.
    ///
    /// The band is computed once from `self`; the filter is not iterated.
    pub fn sanitized(&self) -> SampleSet {
        let (Some(mean), Some(stdev)) = (self.mean(), self.stdev()) else {
            return SampleSet::new();
        };
        let delta = SANITIZE_SIGMAS * stdev;
        let (low, high) = (mean - delta, mean + delta);
        self.data
            .iter()
            .copied()
            .filter(|v| *v >= low && *v <= high)
            .collect()
    }

    /// Writes one value per line in insertion order.
    pub fn write<W: Write>(&self, sink: &mut W) -> Result<(), MetabenchError> {
        for value in &self.data {
            writeln!(sink, "{value}")?;
        }
        Ok(())
    }

    /// Parses the format produced by [`SampleSet::write`].
    pub fn read_from<R: BufRead>(reader: R) -> Result<SampleSet, MetabenchError> {
        let mut samples = SampleSet::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let value = trimmed.parse::<f64>().map_err(|e| {
                MetabenchError::invalid_input(format!("line {}: {trimmed:?}: {e}", idx + 1))
            })?;
            samples.add(value);
        }
        Ok(samples)
    }
}

impl FromIterator<f64> for SampleSet {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

impl Extend<f64> for SampleSet {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        self.data.extend(iter);
    }
}
