//! Micro-benchmark harness with a metastore benchmark catalog.
//!
//! The harness ([`stats`], [`measure`], [`suite`], [`concurrent`]) times
//! arbitrary closures. The catalog in [`benchmarks`] drives any
//! [`metastore::Metastore`] implementation, such as the SQLite-backed
//! [`sqlite_store::SqliteMetastore`]. Run Criterion benchmarks with
//! `cargo bench` to inspect the harness's own overhead.

pub mod benchmarks;
pub mod cli;
pub mod concurrent;
pub mod config;
pub mod errors;
pub mod logging;
pub mod measure;
pub mod metastore;
pub mod report;
pub mod schema;
pub mod sqlite_store;
pub mod stats;
pub mod suite;

pub use crate::concurrent::{CompletionLatch, WorkerPartition, fan_out, measure_fan_out};
pub use crate::errors::MetabenchError;
pub use crate::measure::{measure, measure_simple};
pub use crate::metastore::Metastore;
pub use crate::sqlite_store::SqliteMetastore;
pub use crate::stats::SampleSet;
pub use crate::suite::BenchmarkSuite;
