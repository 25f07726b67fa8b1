//! Persistence of suite results: raw sample files and JSON summaries.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{errors::MetabenchError, stats::SampleSet, suite::BenchmarkSuite};

/// Extension of raw sample files written by [`save_raw`].
pub const RAW_EXTENSION: &str = "txt";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct BenchSummary {
    pub name: String,
    pub samples: usize,
    pub mean: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub stdev: Option<f64>,
    pub err_pct: Option<f64>,
}

impl BenchSummary {
    /// Summary with values divided by `scale`; `err_pct` is scale-free.
    pub fn from_samples(name: &str, samples: &SampleSet, scale: f64) -> Self {
        Self {
            name: name.to_string(),
            samples: samples.len(),
            mean: samples.mean().map(|v| v / scale),
            min: samples.min().map(|v| v / scale),
            max: samples.max().map(|v| v / scale),
            stdev: samples.stdev().map(|v| v / scale),
            err_pct: samples.relative_error(),
        }
    }
}

/// One summary per stored result, in registration order.
pub fn summarize(suite: &BenchmarkSuite) -> Vec<BenchSummary> {
    suite
        .registered()
        .iter()
        .filter_map(|name| {
            suite
                .result(name)
                .map(|samples| BenchSummary::from_samples(name, samples, suite.scale()))
        })
        .collect()
}

pub fn write_json(path: &Path, summaries: &[BenchSummary]) -> Result<(), MetabenchError> {
    let data = serde_json::to_vec_pretty(summaries)
        .map_err(|e| MetabenchError::invalid_input(e.to_string()))?;
    fs::write(path, data)?;
    Ok(())
}

pub fn read_json(path: &Path) -> Result<Vec<BenchSummary>, MetabenchError> {
    let data = fs::read(path)?;
    if data.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&data).map_err(|e| MetabenchError::invalid_input(e.to_string()))
}

/// Path of the raw sample file for `name` under `dir`.
pub fn raw_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.{RAW_EXTENSION}"))
}

/// Writes every stored result to `<dir>/<name>.txt`, creating `dir` if
/// needed. Returns the written paths in registration order.
pub fn save_raw(dir: &Path, suite: &BenchmarkSuite) -> Result<Vec<PathBuf>, MetabenchError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for name in suite.registered() {
        let Some(samples) = suite.result(name) else {
            continue;
        };
        let path = raw_path(dir, name);
        let mut out = BufWriter::new(File::create(&path)?);
        samples.write(&mut out)?;
        out.flush()?;
        written.push(path);
    }
    Ok(written)
}

pub fn load_raw(path: &Path) -> Result<SampleSet, MetabenchError> {
    SampleSet::read_from(BufReader::new(File::open(path)?))
}
