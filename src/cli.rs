use std::path::PathBuf;

use clap::Parser;

use crate::{config::BenchConfig, errors::MetabenchError};

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "metabench", about = "Metastore micro-benchmarks", version)]
pub struct CommandLineConfig {
    /// JSON config file applied before environment and flags.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Metastore location: `memory` or a database file path.
    #[arg(long = "db")]
    pub store: Option<String>,

    /// Metastore database used by the benchmarks.
    #[arg(short = 'd', long)]
    pub dbname: Option<String>,

    /// Owner recorded on created objects.
    #[arg(short = 'u', long = "user")]
    pub owner: Option<String>,

    /// Number of measured iterations.
    #[arg(short = 'B', long = "benchmark")]
    pub iterations: Option<usize>,

    /// Number of warmup iterations.
    #[arg(short = 'W', long)]
    pub warmup: Option<usize>,

    /// Number of objects created by bulk benchmarks.
    #[arg(short = 'N', long)]
    pub objects: Option<usize>,

    /// Number of concurrent workers.
    #[arg(short = 'T', long)]
    pub threads: Option<usize>,

    /// Drop samples outside mean ± 2 standard deviations (`--sanitize=false`
    /// turns off a value set by the config file or environment).
    #[arg(
        short = 'S',
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub sanitize: Option<bool>,

    /// Delimited output instead of a table (`--csv=false` to disable).
    #[arg(
        short = 'C',
        long,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub csv: Option<bool>,

    /// Field separator for delimited output.
    #[arg(long)]
    pub separator: Option<String>,

    /// List benchmarks instead of running them.
    #[arg(short = 'L', long)]
    pub list: bool,

    /// Run benchmarks whose name matches this regular expression.
    #[arg(short = 'F', long)]
    pub filter: Option<String>,

    /// Write the report to this file instead of stdout.
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Directory for raw per-benchmark samples.
    #[arg(long = "savedata")]
    pub save_dir: Option<PathBuf>,

    /// Write a JSON summary to this file.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl CommandLineConfig {
    /// Builds the effective configuration: defaults, config file,
    /// environment, then these flags.
    pub fn load(&self) -> Result<BenchConfig, MetabenchError> {
        let mut config = match &self.config {
            Some(path) => BenchConfig::from_file(path)?,
            None => BenchConfig::default(),
        };
        config.apply_env()?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&self, config: &mut BenchConfig) {
        if let Some(store) = &self.store {
            config.store = store.clone();
        }
        if let Some(dbname) = &self.dbname {
            config.dbname = dbname.clone();
        }
        if let Some(owner) = &self.owner {
            config.owner = owner.clone();
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(warmup) = self.warmup {
            config.warmup = warmup;
        }
        if let Some(objects) = self.objects {
            config.objects = objects;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(sanitize) = self.sanitize {
            config.sanitize = sanitize;
        }
        if let Some(csv) = self.csv {
            config.csv = csv;
        }
        if let Some(separator) = &self.separator {
            config.separator = separator.clone();
        }
        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
        if let Some(output) = &self.output {
            config.output = Some(output.clone());
        }
        if let Some(dir) = &self.save_dir {
            config.save_dir = Some(dir.clone());
        }
        if let Some(json) = &self.json {
            config.json = Some(json.clone());
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
