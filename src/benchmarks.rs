//! Catalog of metastore benchmarks.
//!
//! Every benchmark measures one metastore call (or a small sequence of calls)
//! against the database named in [`BenchData`]. Fixtures that cannot be set
//! up are logged and the benchmark returns `None`. Failures inside a timed
//! call are logged and still counted as samples.

use std::rc::Rc;

use tracing::warn;

use crate::{
    concurrent::{WorkerPartition, measure_fan_out, partitions},
    errors::MetabenchError,
    measure::{measure, measure_simple},
    metastore::{Database, Metastore, Partition, Table, TableBuilder, make_partition, parse_schema},
    stats::SampleSet,
    suite::BenchmarkSuite,
};

pub const TEST_TABLE: &str = "test_table";
pub const TEST_SCHEMA: &str = "name";
pub const PARTITION_SCHEMA: &str = "date";
/// Partition value prefix used by single-threaded partition benchmarks.
pub const PARTITION_PREFIX: &str = "d";
/// Worker prefix used by the concurrent partition benchmark.
pub const WORKER_PREFIX: &str = "w";

pub struct BenchData<C> {
    pub warmup: usize,
    pub iterations: usize,
    /// Objects (tables or partitions) created by bulk benchmarks.
    pub objects: usize,
    /// Workers used by concurrent benchmarks.
    pub threads: usize,
    pub dbname: String,
    pub owner: String,
    pub client: C,
}

pub type BenchFn<C> = fn(&BenchData<C>) -> Option<SampleSet>;

/// Benchmarks in registration order.
pub fn catalog<C>() -> Vec<(&'static str, BenchFn<C>)>
where
    C: Metastore + Send,
{
    let catalog: [(&'static str, BenchFn<C>); 18] = [
        ("getNotificationId", bench_get_notification_id::<C>),
        ("listDatabases", bench_list_databases::<C>),
        ("getDatabase", bench_get_database::<C>),
        ("createDatabase", bench_create_database::<C>),
        ("dropDatabase", bench_drop_database::<C>),
        ("createTable", bench_create_table::<C>),
        ("dropTable", bench_drop_table::<C>),
        ("getTable", bench_get_table::<C>),
        ("listTables", bench_list_many_tables::<C>),
        ("addPartition", bench_add_partition::<C>),
        ("dropPartition", bench_drop_partition::<C>),
        ("createPartitions", bench_create_partitions::<C>),
        ("getPartitions", bench_get_partitions::<C>),
        ("dropPartitions", bench_drop_partitions::<C>),
        ("renameTable", bench_table_rename::<C>),
        ("renameTableWithPartitions", bench_table_rename_with_partitions::<C>),
        ("addPartitionsInParallel", bench_add_partitions_in_parallel::<C>),
        ("dropTableWithPartitions", bench_drop_table_with_partitions::<C>),
    ];
    catalog.to_vec()
}

pub fn register_all<C>(suite: &mut BenchmarkSuite, data: Rc<BenchData<C>>)
where
    C: Metastore + Send + 'static,
{
    for (name, bench) in catalog::<C>() {
        let data = Rc::clone(&data);
        suite.add(name, move || bench(&data));
    }
}

fn logged<T>(what: &str, result: Result<T, MetabenchError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "{what} failed");
            None
        }
    }
}

fn test_table(data: &BenchData<impl Metastore>) -> Table {
    TableBuilder::new(&data.dbname, TEST_TABLE)
        .with_owner(&data.owner)
        .with_columns(parse_schema(TEST_SCHEMA))
        .build()
}

fn partitioned_table(data: &BenchData<impl Metastore>, name: &str) -> Table {
    TableBuilder::new(&data.dbname, name)
        .with_owner(&data.owner)
        .with_columns(parse_schema(TEST_SCHEMA))
        .with_partition_keys(parse_schema(PARTITION_SCHEMA))
        .build()
}

/// Values `{prefix}0 .. {prefix}{count-1}`.
pub fn partition_values(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|idx| format!("{prefix}{idx}")).collect()
}

/// Names `date=<value>` for single-key partitions.
pub fn partition_names(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|value| format!("{PARTITION_SCHEMA}={value}"))
        .collect()
}

/// One single-value partition of `table` per entry in `values`.
pub fn make_many_partitions(
    table: &Table,
    values: &[String],
) -> Result<Vec<Partition>, MetabenchError> {
    values
        .iter()
        .map(|value| make_partition(table, std::slice::from_ref(value)))
        .collect()
}

/// Creates a partitioned test table, runs `bench` against the stored
/// definition and drops the table afterwards.
fn with_partitioned_table<C, F>(data: &BenchData<C>, bench: F) -> Option<SampleSet>
where
    C: Metastore,
    F: FnOnce(&Table) -> Option<SampleSet>,
{
    let table = partitioned_table(data, TEST_TABLE);
    if let Err(err) = data.client.create_table(&table) {
        warn!(error = %err, "failed to create partitioned table");
        return None;
    }
    let result = match data.client.get_table(&data.dbname, TEST_TABLE) {
        Ok(table) => bench(&table),
        Err(err) => {
            warn!(error = %err, "failed to get table");
            None
        }
    };
    logged("drop table", data.client.drop_table(&data.dbname, TEST_TABLE));
    result
}

fn bench_get_notification_id<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    Some(measure_simple(
        || {
            logged("get notification id", data.client.current_notification_id());
        },
        data.warmup,
        data.iterations,
    ))
}

fn bench_list_databases<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    Some(measure_simple(
        || {
            logged("list databases", data.client.all_databases());
        },
        data.warmup,
        data.iterations,
    ))
}

fn bench_get_database<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    Some(measure_simple(
        || {
            logged("get database", data.client.get_database(&data.dbname));
        },
        data.warmup,
        data.iterations,
    ))
}

fn bench_create_database<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let tmp = Database::new(format!("{}_tmp", data.dbname));
    Some(measure(
        None,
        &mut || {
            logged("create database", data.client.create_database(&tmp));
        },
        Some(&mut || {
            logged("drop database", data.client.drop_database(&tmp.name, true));
        }),
        data.warmup,
        data.iterations,
    ))
}

fn bench_drop_database<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let tmp = Database::new(format!("{}_tmp", data.dbname));
    Some(measure(
        Some(&mut || {
            logged("create database", data.client.create_database(&tmp));
        }),
        &mut || {
            logged("drop database", data.client.drop_database(&tmp.name, true));
        },
        None,
        data.warmup,
        data.iterations,
    ))
}

fn bench_create_table<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let table = test_table(data);
    Some(measure(
        None,
        &mut || {
            logged("create table", data.client.create_table(&table));
        },
        Some(&mut || {
            logged("drop table", data.client.drop_table(&data.dbname, TEST_TABLE));
        }),
        data.warmup,
        data.iterations,
    ))
}

fn bench_drop_table<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let table = test_table(data);
    Some(measure(
        Some(&mut || {
            logged("create table", data.client.create_table(&table));
        }),
        &mut || {
            logged("drop table", data.client.drop_table(&data.dbname, TEST_TABLE));
        },
        None,
        data.warmup,
        data.iterations,
    ))
}

fn bench_get_table<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let table = test_table(data);
    if let Err(err) = data.client.create_table(&table) {
        warn!(error = %err, "failed to create table");
        return None;
    }
    let stats = measure_simple(
        || {
            logged("get table", data.client.get_table(&data.dbname, TEST_TABLE));
        },
        data.warmup,
        data.iterations,
    );
    logged("drop table", data.client.drop_table(&data.dbname, TEST_TABLE));
    Some(stats)
}

/// Measures listing a database that holds `objects` tables.
fn bench_list_many_tables<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let names: Vec<String> = (0..data.objects).map(|idx| format!("table_{idx}")).collect();
    for (idx, name) in names.iter().enumerate() {
        let table = TableBuilder::new(&data.dbname, name)
            .with_owner(&data.owner)
            .with_columns(parse_schema(TEST_SCHEMA))
            .build();
        if let Err(err) = data.client.create_table(&table) {
            warn!(error = %err, table = name.as_str(), "failed to create table");
            for created in &names[..idx] {
                logged("drop table", data.client.drop_table(&data.dbname, created));
            }
            return None;
        }
    }
    let stats = measure_simple(
        || {
            logged("list tables", data.client.all_tables(&data.dbname));
        },
        data.warmup,
        data.iterations,
    );
    for name in &names {
        logged("drop table", data.client.drop_table(&data.dbname, name));
    }
    Some(stats)
}

fn bench_add_partition<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| {
        let values = vec![format!("{PARTITION_PREFIX}1")];
        let partition = logged("make partition", make_partition(table, &values))?;
        Some(measure(
            None,
            &mut || {
                logged("add partition", data.client.add_partition(&partition));
            },
            Some(&mut || {
                logged(
                    "drop partition",
                    data.client.drop_partition(&data.dbname, TEST_TABLE, &values),
                );
            }),
            data.warmup,
            data.iterations,
        ))
    })
}

fn bench_drop_partition<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| {
        let values = vec![format!("{PARTITION_PREFIX}1")];
        let partition = logged("make partition", make_partition(table, &values))?;
        Some(measure(
            Some(&mut || {
                logged("add partition", data.client.add_partition(&partition));
            }),
            &mut || {
                logged(
                    "drop partition",
                    data.client.drop_partition(&data.dbname, TEST_TABLE, &values),
                );
            },
            None,
            data.warmup,
            data.iterations,
        ))
    })
}

fn bench_create_partitions<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| {
        let values = partition_values(PARTITION_PREFIX, data.objects);
        let partitions = logged("make partitions", make_many_partitions(table, &values))?;
        let names = partition_names(&values);
        Some(measure(
            None,
            &mut || {
                logged("add partitions", data.client.add_partitions(&partitions));
            },
            Some(&mut || {
                logged(
                    "drop partitions",
                    data.client.drop_partitions(&data.dbname, TEST_TABLE, &names),
                );
            }),
            data.warmup,
            data.iterations,
        ))
    })
}

/// Measures fetching all partitions of a table holding `objects` partitions.
fn bench_get_partitions<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| {
        let values = partition_values(PARTITION_PREFIX, data.objects);
        let partitions = logged("make partitions", make_many_partitions(table, &values))?;
        logged("add partitions", data.client.add_partitions(&partitions))?;
        let stats = measure_simple(
            || {
                logged(
                    "get partitions",
                    data.client.get_partitions(&data.dbname, TEST_TABLE),
                );
            },
            data.warmup,
            data.iterations,
        );
        logged(
            "drop partitions",
            data.client
                .drop_partitions(&data.dbname, TEST_TABLE, &partition_names(&values)),
        );
        Some(stats)
    })
}

fn bench_drop_partitions<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| {
        let values = partition_values(PARTITION_PREFIX, data.objects);
        let partitions = logged("make partitions", make_many_partitions(table, &values))?;
        let names = partition_names(&values);
        Some(measure(
            Some(&mut || {
                logged("add partitions", data.client.add_partitions(&partitions));
            }),
            &mut || {
                logged(
                    "drop partitions",
                    data.client.drop_partitions(&data.dbname, TEST_TABLE, &names),
                );
            },
            None,
            data.warmup,
            data.iterations,
        ))
    })
}

/// Renames the table back and forth; one sample covers both renames.
fn measure_rename<C: Metastore>(data: &BenchData<C>, table: &Table) -> SampleSet {
    let new_name = format!("{TEST_TABLE}_renamed");
    let mut original = table.clone();
    original.location = String::new();
    let mut renamed = original.clone();
    renamed.table_name = new_name.clone();
    measure_simple(
        || {
            logged(
                "rename table",
                data.client.alter_table(&data.dbname, TEST_TABLE, &renamed),
            );
            logged(
                "rename table back",
                data.client.alter_table(&data.dbname, &new_name, &original),
            );
        },
        data.warmup,
        data.iterations,
    )
}

fn bench_table_rename<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| Some(measure_rename(data, table)))
}

fn bench_table_rename_with_partitions<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    with_partitioned_table(data, |table| {
        let values = partition_values(PARTITION_PREFIX, data.objects);
        let partitions = logged("make partitions", make_many_partitions(table, &values))?;
        logged("add partitions", data.client.add_partitions(&partitions))?;
        Some(measure_rename(data, table))
    })
}

/// `threads` workers, each on its own connection, add and then drop
/// `objects` partitions under a worker-specific prefix. One sample spans
/// the whole fan-out.
fn bench_add_partitions_in_parallel<C>(data: &BenchData<C>) -> Option<SampleSet>
where
    C: Metastore + Send,
{
    let objects = data.objects;
    with_partitioned_table(data, |table| {
        Some(measure_fan_out(
            || {
                partitions(data.threads, WORKER_PREFIX)
                    .into_iter()
                    .map(|partition| (partition, data.client.try_clone()))
                    .collect::<Vec<_>>()
            },
            move |(partition, client): (WorkerPartition, Result<C, MetabenchError>)| {
                add_drop_partitions(table, objects, partition, client)
            },
            data.warmup,
            data.iterations,
        ))
    })
}

fn add_drop_partitions<C: Metastore>(
    table: &Table,
    count: usize,
    partition: WorkerPartition,
    client: Result<C, MetabenchError>,
) {
    let client = match client {
        Ok(client) => client,
        Err(err) => {
            warn!(worker = partition.index, error = %err, "failed to open worker connection");
            return;
        }
    };
    let values = partition.keys(count);
    let Some(parts) = logged("make partitions", make_many_partitions(table, &values)) else {
        return;
    };
    if let Err(err) = client.add_partitions(&parts) {
        warn!(worker = partition.index, error = %err, "failed to add partitions");
    }
    if let Err(err) =
        client.drop_partitions(&table.db_name, &table.table_name, &partition_names(&values))
    {
        warn!(worker = partition.index, error = %err, "failed to drop partitions");
    }
}

fn bench_drop_table_with_partitions<C: Metastore>(data: &BenchData<C>) -> Option<SampleSet> {
    let table = partitioned_table(data, TEST_TABLE);
    let values = partition_values(PARTITION_PREFIX, data.objects);
    Some(measure(
        Some(&mut || {
            if logged("create table", data.client.create_table(&table)).is_none() {
                return;
            }
            if let Some(stored) = logged(
                "get table",
                data.client.get_table(&data.dbname, TEST_TABLE),
            ) {
                if let Some(partitions) =
                    logged("make partitions", make_many_partitions(&stored, &values))
                {
                    logged("add partitions", data.client.add_partitions(&partitions));
                }
            }
        }),
        &mut || {
            logged("drop table", data.client.drop_table(&data.dbname, TEST_TABLE));
        },
        None,
        data.warmup,
        data.iterations,
    ))
}
