//! Named registry of benchmark runners and their results.
//!
//! A suite is created once per run, populated with [`BenchmarkSuite::add`],
//! executed with [`BenchmarkSuite::run`] or [`BenchmarkSuite::run_selected`]
//! and then rendered. Runners execute sequentially; a runner that returns
//! `None` produced no data and is skipped.

use std::io::Write;

use ahash::AHashMap;
use regex::Regex;
use tracing::{info, warn};

use crate::{errors::MetabenchError, stats::SampleSet};

/// A benchmark body that performs its own measurement.
pub type Runner = Box<dyn FnMut() -> Option<SampleSet>>;

pub const TABLE_HEADER: [&str; 5] = ["Operation", "Mean", "Min", "Max", "Err%"];
/// Significant digits shown per reported value.
pub const SIGNIFICANT_DIGITS: usize = 3;

pub struct BenchmarkSuite {
    scale: f64,
    sanitize: bool,
    names: Vec<String>,
    benchmarks: AHashMap<String, Runner>,
    results: AHashMap<String, SampleSet>,
}

impl BenchmarkSuite {
    /// `scale` divides every reported value (1e6 reports nanoseconds as
    /// milliseconds); `sanitize` stores [`SampleSet::sanitized`] results.
    pub fn new(scale: f64, sanitize: bool) -> Self {
        Self {
            scale,
            sanitize,
            names: Vec::new(),
            benchmarks: AHashMap::new(),
            results: AHashMap::new(),
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn sanitize(&self) -> bool {
        self.sanitize
    }

    /// Registers `runner` under `name`, replacing any previous runner.
    pub fn add<N, F>(&mut self, name: N, runner: F) -> &mut Self
    where
        N: Into<String>,
        F: FnMut() -> Option<SampleSet> + 'static,
    {
        let name = name.into();
        if !self.benchmarks.contains_key(&name) {
            self.names.push(name.clone());
        }
        self.benchmarks.insert(name, Box::new(runner));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Names in registration order.
    pub fn registered(&self) -> &[String] {
        &self.names
    }

    /// Names in lexicographic order.
    pub fn list(&self) -> Vec<String> {
        let mut names = self.names.clone();
        names.sort();
        names
    }

    /// Sorted names matching `filter`.
    pub fn matching(&self, filter: &Regex) -> Vec<String> {
        self.list()
            .into_iter()
            .filter(|name| filter.is_match(name))
            .collect()
    }

    pub fn run(&mut self) -> &mut Self {
        let names = self.names.clone();
        for name in &names {
            self.run_one(name);
        }
        self
    }

    /// Runs only `names`, in the given order. Unknown names are skipped.
    pub fn run_selected<S: AsRef<str>>(&mut self, names: &[S]) -> &mut Self {
        for name in names {
            self.run_one(name.as_ref());
        }
        self
    }

    fn run_one(&mut self, name: &str) {
        let Some(runner) = self.benchmarks.get_mut(name) else {
            warn!(benchmark = name, "skipping unknown benchmark");
            return;
        };
        info!(benchmark = name, "running");
        match runner() {
            Some(result) => {
                let result = if self.sanitize {
                    result.sanitized()
                } else {
                    result
                };
                self.results.insert(name.to_string(), result);
            }
            None => warn!(benchmark = name, "benchmark produced no result, skipping"),
        }
    }

    pub fn results(&self) -> &AHashMap<String, SampleSet> {
        &self.results
    }

    pub fn result(&self, name: &str) -> Option<&SampleSet> {
        self.results.get(name)
    }

    /// Renders a fixed-width table, one row per stored result.
    pub fn display<W: Write>(&self, out: &mut W) -> Result<(), MetabenchError> {
        let [op, mean, min, max, err] = TABLE_HEADER;
        writeln!(out, "{op:<30} {mean:<8} {min:<8} {max:<8} {err:<8}")?;
        for (name, result) in self.stored() {
            let [mean, min, max, err] = self.row(result).map(|cell| format_cell(cell, 8));
            writeln!(out, "{name:<30} {mean} {min} {max} {err}")?;
        }
        Ok(())
    }

    /// Renders the same rows as [`BenchmarkSuite::display`], `separator`-delimited.
    pub fn display_csv<W: Write>(&self, out: &mut W, separator: &str) -> Result<(), MetabenchError> {
        writeln!(out, "{}", TABLE_HEADER.join(separator))?;
        for (name, result) in self.stored() {
            let cells = self.row(result).map(|cell| format_cell(cell, 0));
            writeln!(out, "{name}{separator}{}", cells.join(separator))?;
        }
        Ok(())
    }

    fn stored(&self) -> impl Iterator<Item = (&str, &SampleSet)> {
        self.names
            .iter()
            .filter_map(|name| self.results.get(name).map(|result| (name.as_str(), result)))
    }

    fn row(&self, result: &SampleSet) -> [Option<f64>; 4] {
        [
            result.mean().map(|v| v / self.scale),
            result.min().map(|v| v / self.scale),
            result.max().map(|v| v / self.scale),
            result.relative_error(),
        ]
    }
}

fn format_cell(value: Option<f64>, width: usize) -> String {
    let cell = match value {
        Some(v) => significant(v, SIGNIFICANT_DIGITS),
        None => "-".to_string(),
    };
    format!("{cell:<width$}")
}

/// Formats `value` with `digits` significant digits, switching to an
/// exponent for very small or very large magnitudes. Trailing zeros are
/// dropped.
pub fn significant(value: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if value == 0.0 || !value.is_finite() {
        return value.to_string();
    }
    let scientific = format!("{value:.prec$e}", prec = digits - 1);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= digits as i32 {
        format!("{}e{exponent}", trim_fraction(mantissa))
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
