//! Log initialization for the `metabench` binary.
//!
//! Logs go to stderr so reports on stdout stay machine-readable. The filter
//! comes from `METABENCH_LOG` (an `EnvFilter` directive) and falls back to the
//! level requested on the command line.

use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_ENV: &str = "METABENCH_LOG";

pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    // Keep an already-installed subscriber.
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
