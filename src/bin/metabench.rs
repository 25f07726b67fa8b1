use std::{
    fs::File,
    io::{self, BufWriter, Write},
    process,
    rc::Rc,
};

use clap::Parser;
use tracing::{info, warn};

use metabench::{
    BenchmarkSuite, Metastore, MetabenchError, SqliteMetastore,
    benchmarks::{BenchData, register_all},
    cli::CommandLineConfig,
    config::BenchConfig,
    logging::init_logging,
    metastore::Database,
    report,
};

fn main() {
    let cli = CommandLineConfig::parse();
    init_logging(cli.log_level());
    let config = match cli.load() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let admin = match SqliteMetastore::open_location(&config.store) {
        Ok(store) => store,
        Err(err) => {
            eprintln!("failed to open metastore {}: {err}", config.store);
            process::exit(1);
        }
    };

    let result = if cli.list {
        list_benchmarks(&admin, &config)
    } else {
        run_benchmarks(&admin, &config)
    };
    if let Err(err) = result {
        eprintln!("benchmark failed: {err}");
        process::exit(1);
    }
}

fn build_suite(
    admin: &SqliteMetastore,
    config: &BenchConfig,
) -> Result<BenchmarkSuite, MetabenchError> {
    let data = Rc::new(BenchData {
        warmup: config.warmup,
        iterations: config.iterations,
        objects: config.objects,
        threads: config.threads,
        dbname: config.effective_dbname(),
        owner: config.owner.clone(),
        client: admin.try_clone()?,
    });
    let mut suite = BenchmarkSuite::new(config.scale, config.sanitize);
    register_all(&mut suite, data);
    Ok(suite)
}

fn selected_names(suite: &BenchmarkSuite, config: &BenchConfig) -> Result<Vec<String>, MetabenchError> {
    Ok(match config.filter_regex()? {
        Some(filter) => suite.matching(&filter),
        None => suite.list(),
    })
}

fn list_benchmarks(admin: &SqliteMetastore, config: &BenchConfig) -> Result<(), MetabenchError> {
    let suite = build_suite(admin, config)?;
    let mut out = io::stdout().lock();
    for name in selected_names(&suite, config)? {
        writeln!(out, "{name}")?;
    }
    Ok(())
}

fn run_benchmarks(admin: &SqliteMetastore, config: &BenchConfig) -> Result<(), MetabenchError> {
    let dbname = config.effective_dbname();
    let created = ensure_database(admin, &dbname, &config.owner)?;
    let outcome = execute(admin, config);
    if created {
        if let Err(err) = admin.drop_database(&dbname, true) {
            warn!(database = dbname.as_str(), error = %err, "failed to drop benchmark database");
        }
    }
    outcome
}

fn execute(admin: &SqliteMetastore, config: &BenchConfig) -> Result<(), MetabenchError> {
    let mut suite = build_suite(admin, config)?;
    info!(
        store = %admin.source().path().display(),
        sanitize = suite.sanitize(),
        iterations = config.iterations,
        "starting benchmark run"
    );
    if config.filter.is_some() {
        let names = selected_names(&suite, config)?;
        if names.is_empty() {
            warn!("no benchmarks match the filter");
        }
        suite.run_selected(&names);
    } else {
        suite.run();
    }

    let mut out: Box<dyn Write> = match &config.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(io::stdout().lock()),
    };
    if config.csv {
        suite.display_csv(&mut out, &config.separator)?;
    } else {
        suite.display(&mut out)?;
    }
    out.flush()?;

    if let Some(dir) = &config.save_dir {
        let written = report::save_raw(dir, &suite)?;
        info!(files = written.len(), dir = %dir.display(), "saved raw samples");
    }
    if let Some(path) = &config.json {
        report::write_json(path, &report::summarize(&suite))?;
    }
    Ok(())
}

/// Creates `dbname` unless it exists; returns whether it was created.
fn ensure_database(
    admin: &SqliteMetastore,
    dbname: &str,
    owner: &str,
) -> Result<bool, MetabenchError> {
    match admin.get_database(dbname) {
        Ok(_) => Ok(false),
        Err(MetabenchError::NotFound(_)) => {
            admin.create_database(&Database {
                name: dbname.to_string(),
                description: Some("metabench scratch database".to_string()),
                owner: Some(owner.to_string()),
                location: None,
            })?;
            Ok(true)
        }
        Err(err) => Err(err),
    }
}
