//! Benchmark run configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON config file,
//! then `METABENCH_*` environment variables, then command-line flags (see
//! [`crate::cli`]).

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::MetabenchError;

pub const ENV_PREFIX: &str = "METABENCH_";
/// Store location that selects an in-memory metastore.
pub const MEMORY_STORE: &str = "memory";
/// Nanoseconds per reported unit (milliseconds).
pub const DEFAULT_SCALE: f64 = 1_000_000.0;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BenchConfig {
    /// `memory` or a path to the metastore database file.
    pub store: String,
    /// Metastore database used by the benchmarks; empty derives one from the owner.
    pub dbname: String,
    pub owner: String,
    pub warmup: usize,
    pub iterations: usize,
    pub objects: usize,
    pub threads: usize,
    pub sanitize: bool,
    pub csv: bool,
    pub separator: String,
    pub scale: f64,
    pub filter: Option<String>,
    pub output: Option<PathBuf>,
    pub save_dir: Option<PathBuf>,
    pub json: Option<PathBuf>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            store: MEMORY_STORE.to_string(),
            dbname: String::new(),
            owner: "user".to_string(),
            warmup: 15,
            iterations: 100,
            objects: 100,
            threads: 1,
            sanitize: false,
            csv: false,
            separator: ",".to_string(),
            scale: DEFAULT_SCALE,
            filter: None,
            output: None,
            save_dir: None,
            json: None,
        }
    }
}

impl BenchConfig {
    pub fn from_file(path: &Path) -> Result<Self, MetabenchError> {
        let data = fs::read(path)?;
        serde_json::from_slice(&data).map_err(|e| {
            MetabenchError::invalid_input(format!("config {}: {e}", path.display()))
        })
    }

    /// Overlays `METABENCH_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), MetabenchError> {
        self.apply_env_from(|key| env::var(key).ok())
    }

    /// Overlays variables resolved by `lookup` (keys include [`ENV_PREFIX`]).
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), MetabenchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        if let Some(value) = var("STORE") {
            self.store = value;
        }
        if let Some(value) = var("DBNAME") {
            self.dbname = value;
        }
        if let Some(value) = var("USER") {
            self.owner = value;
        }
        if let Some(value) = var("WARMUP") {
            self.warmup = parse_var("WARMUP", &value)?;
        }
        if let Some(value) = var("ITERATIONS") {
            self.iterations = parse_var("ITERATIONS", &value)?;
        }
        if let Some(value) = var("OBJECTS") {
            self.objects = parse_var("OBJECTS", &value)?;
        }
        if let Some(value) = var("THREADS") {
            self.threads = parse_var("THREADS", &value)?;
        }
        if let Some(value) = var("SANITIZE") {
            self.sanitize = parse_var("SANITIZE", &value)?;
        }
        if let Some(value) = var("SCALE") {
            self.scale = parse_var("SCALE", &value)?;
        }
        if let Some(value) = var("FILTER") {
            self.filter = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), MetabenchError> {
        if self.iterations == 0 {
            return Err(MetabenchError::invalid_input("iterations must be positive"));
        }
        if self.threads == 0 {
            return Err(MetabenchError::invalid_input("threads must be positive"));
        }
        if !(self.scale.is_finite() && self.scale > 0.0) {
            return Err(MetabenchError::invalid_input("scale must be a positive number"));
        }
        if self.separator.is_empty() {
            return Err(MetabenchError::invalid_input("separator must not be empty"));
        }
        self.filter_regex()?;
        Ok(())
    }

    pub fn filter_regex(&self) -> Result<Option<Regex>, MetabenchError> {
        self.filter
            .as_deref()
            .map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| MetabenchError::invalid_input(format!("filter {pattern:?}: {e}")))
            })
            .transpose()
    }

    /// The configured database name, or `metabench_<owner>` when unset.
    pub fn effective_dbname(&self) -> String {
        if self.dbname.is_empty() {
            format!("metabench_{}", self.owner)
        } else {
            self.dbname.clone()
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, MetabenchError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        MetabenchError::invalid_input(format!("{ENV_PREFIX}{name}={value:?}: {e}"))
    })
}
