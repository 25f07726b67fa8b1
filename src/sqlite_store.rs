//! [`Metastore`] implementation on top of SQLite.
//!
//! Each [`SqliteMetastore`] owns one connection. [`Metastore::try_clone`]
//! opens another connection to the same database, which is how concurrent
//! benchmarks obtain one handle per worker. Every store is file-backed and
//! runs in WAL mode with a busy timeout, so concurrent writers wait for the
//! lock instead of failing. The `memory` store is a scratch database in a
//! temporary directory that lives as long as any handle to it.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rusqlite::{Connection, OptionalExtension, Row, Transaction, TransactionBehavior, params};
use tempfile::TempDir;

use crate::{
    config::MEMORY_STORE,
    errors::MetabenchError,
    metastore::{Database, Metastore, Partition, Table, TableType, partition_name},
    schema::ensure_schema,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const WAREHOUSE_ROOT: &str = "/warehouse";
const SCRATCH_FILE: &str = "metastore.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreSource {
    File(PathBuf),
    /// Database file inside a temporary directory owned by the handles.
    Scratch(PathBuf),
}

impl StoreSource {
    pub fn path(&self) -> &Path {
        match self {
            StoreSource::File(path) | StoreSource::Scratch(path) => path,
        }
    }
}

pub struct SqliteMetastore {
    conn: Connection,
    source: StoreSource,
    // Dropped after `conn`; removes the scratch directory with the last handle.
    scratch: Option<Arc<TempDir>>,
}

impl SqliteMetastore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MetabenchError> {
        Self::connect(StoreSource::File(path.as_ref().to_path_buf()), None)
    }

    /// Opens a private scratch store that disappears with its last handle.
    pub fn open_in_memory() -> Result<Self, MetabenchError> {
        let dir = tempfile::Builder::new()
            .prefix("metabench-")
            .tempdir()
            .map_err(|e| MetabenchError::connection(format!("scratch directory: {e}")))?;
        let path = dir.path().join(SCRATCH_FILE);
        Self::connect(StoreSource::Scratch(path), Some(Arc::new(dir)))
    }

    /// Opens `memory` as a scratch store and anything else as a file path.
    pub fn open_location(location: &str) -> Result<Self, MetabenchError> {
        if location == MEMORY_STORE {
            Self::open_in_memory()
        } else {
            Self::open(location)
        }
    }

    fn connect(
        source: StoreSource,
        scratch: Option<Arc<TempDir>>,
    ) -> Result<Self, MetabenchError> {
        let conn = Connection::open(source.path())
            .map_err(|e| MetabenchError::connection(e.to_string()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| MetabenchError::connection(e.to_string()))?;
        let _mode: String = conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| MetabenchError::connection(e.to_string()))?;
        ensure_schema(&conn)?;
        Ok(Self {
            conn,
            source,
            scratch,
        })
    }

    pub fn source(&self) -> &StoreSource {
        &self.source
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    fn write_tx(&self) -> Result<Transaction<'_>, MetabenchError> {
        Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)
            .map_err(|e| MetabenchError::query(e.to_string()))
    }
}

impl Metastore for SqliteMetastore {
    fn try_clone(&self) -> Result<Self, MetabenchError> {
        Self::connect(self.source.clone(), self.scratch.clone())
    }

    fn current_notification_id(&self) -> Result<i64, MetabenchError> {
        self.conn
            .query_row(
                "SELECT COALESCE(MAX(id), 0) FROM ms_notifications",
                [],
                |row| row.get(0),
            )
            .map_err(|e| MetabenchError::query(e.to_string()))
    }

    fn all_databases(&self) -> Result<Vec<String>, MetabenchError> {
        collect_names(&self.conn, "SELECT name FROM ms_databases ORDER BY name", [])
    }

    fn get_database(&self, name: &str) -> Result<Database, MetabenchError> {
        self.conn
            .query_row(
                "SELECT name, description, owner, location FROM ms_databases WHERE name=?1",
                params![name],
                |row| {
                    Ok(Database {
                        name: row.get(0)?,
                        description: row.get(1)?,
                        owner: row.get(2)?,
                        location: row.get(3)?,
                    })
                },
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    MetabenchError::not_found(format!("database {name}"))
                }
                other => MetabenchError::query(other.to_string()),
            })
    }

    fn create_database(&self, database: &Database) -> Result<(), MetabenchError> {
        if database.name.trim().is_empty() {
            return Err(MetabenchError::invalid_input("database name must not be empty"));
        }
        let tx = self.write_tx()?;
        if database_exists(&tx, &database.name)? {
            return Err(MetabenchError::already_exists(format!(
                "database {}",
                database.name
            )));
        }
        let location = database
            .location
            .clone()
            .unwrap_or_else(|| format!("{WAREHOUSE_ROOT}/{}.db", database.name));
        tx.execute(
            "INSERT INTO ms_databases(name, description, owner, location) VALUES(?1, ?2, ?3, ?4)",
            params![
                database.name.as_str(),
                database.description.as_deref(),
                database.owner.as_deref(),
                location,
            ],
        )
        .map_err(|e| MetabenchError::query(e.to_string()))?;
        notify(&tx, "CREATE_DATABASE", &database.name, None)?;
        commit(tx)
    }

    fn drop_database(&self, name: &str, cascade: bool) -> Result<(), MetabenchError> {
        let tx = self.write_tx()?;
        if !database_exists(&tx, name)? {
            return Err(MetabenchError::not_found(format!("database {name}")));
        }
        let tables: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM ms_tables WHERE db_name=?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| MetabenchError::query(e.to_string()))?;
        if tables > 0 && !cascade {
            return Err(MetabenchError::invalid_input(format!(
                "database {name} is not empty ({tables} tables)"
            )));
        }
        for sql in [
            "DELETE FROM ms_partitions WHERE db_name=?1",
            "DELETE FROM ms_tables WHERE db_name=?1",
            "DELETE FROM ms_databases WHERE name=?1",
        ] {
            tx.execute(sql, params![name])
                .map_err(|e| MetabenchError::query(e.to_string()))?;
        }
        notify(&tx, "DROP_DATABASE", name, None)?;
        commit(tx)
    }

    fn all_tables(&self, db_name: &str) -> Result<Vec<String>, MetabenchError> {
        if !database_exists(&self.conn, db_name)? {
            return Err(MetabenchError::not_found(format!("database {db_name}")));
        }
        collect_names(
            &self.conn,
            "SELECT table_name FROM ms_tables WHERE db_name=?1 ORDER BY table_name",
            params![db_name],
        )
    }

    fn get_table(&self, db_name: &str, table_name: &str) -> Result<Table, MetabenchError> {
        fetch_table(&self.conn, db_name, table_name)?
            .ok_or_else(|| MetabenchError::not_found(format!("table {db_name}.{table_name}")))
    }

    fn create_table(&self, table: &Table) -> Result<(), MetabenchError> {
        if table.table_name.trim().is_empty() {
            return Err(MetabenchError::invalid_input("table name must not be empty"));
        }
        let tx = self.write_tx()?;
        if !database_exists(&tx, &table.db_name)? {
            return Err(MetabenchError::not_found(format!(
                "database {}",
                table.db_name
            )));
        }
        if fetch_table(&tx, &table.db_name, &table.table_name)?.is_some() {
            return Err(MetabenchError::already_exists(format!(
                "table {}.{}",
                table.db_name, table.table_name
            )));
        }
        let columns = to_json(&table.columns)?;
        let keys = to_json(&table.partition_keys)?;
        tx.execute(
            "INSERT INTO ms_tables(db_name, table_name, owner, table_type, location, columns, partition_keys)
             VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                table.db_name.as_str(),
                table.table_name.as_str(),
                table.owner.as_deref(),
                table.table_type.as_str(),
                table_location(table),
                columns,
                keys,
            ],
        )
        .map_err(|e| MetabenchError::query(e.to_string()))?;
        notify(&tx, "CREATE_TABLE", &table.db_name, Some(&table.table_name))?;
        commit(tx)
    }

    fn alter_table(
        &self,
        db_name: &str,
        table_name: &str,
        table: &Table,
    ) -> Result<(), MetabenchError> {
        if table.db_name != db_name {
            return Err(MetabenchError::invalid_input(format!(
                "cannot move table {table_name} from {db_name} to {}",
                table.db_name
            )));
        }
        let tx = self.write_tx()?;
        if fetch_table(&tx, db_name, table_name)?.is_none() {
            return Err(MetabenchError::not_found(format!(
                "table {db_name}.{table_name}"
            )));
        }
        let renamed = table.table_name != table_name;
        if renamed && fetch_table(&tx, db_name, &table.table_name)?.is_some() {
            return Err(MetabenchError::already_exists(format!(
                "table {db_name}.{}",
                table.table_name
            )));
        }
        let columns = to_json(&table.columns)?;
        let keys = to_json(&table.partition_keys)?;
        tx.execute(
            "UPDATE ms_tables SET table_name=?1, owner=?2, table_type=?3, location=?4, columns=?5, partition_keys=?6
             WHERE db_name=?7 AND table_name=?8",
            params![
                table.table_name.as_str(),
                table.owner.as_deref(),
                table.table_type.as_str(),
                table_location(table),
                columns,
                keys,
                db_name,
                table_name,
            ],
        )
        .map_err(|e| MetabenchError::query(e.to_string()))?;
        if renamed {
            tx.execute(
                "UPDATE ms_partitions SET table_name=?1 WHERE db_name=?2 AND table_name=?3",
                params![table.table_name.as_str(), db_name, table_name],
            )
            .map_err(|e| MetabenchError::query(e.to_string()))?;
        }
        notify(&tx, "ALTER_TABLE", db_name, Some(&table.table_name))?;
        commit(tx)
    }

    fn drop_table(&self, db_name: &str, table_name: &str) -> Result<(), MetabenchError> {
        let tx = self.write_tx()?;
        tx.execute(
            "DELETE FROM ms_partitions WHERE db_name=?1 AND table_name=?2",
            params![db_name, table_name],
        )
        .map_err(|e| MetabenchError::query(e.to_string()))?;
        let affected = tx
            .execute(
                "DELETE FROM ms_tables WHERE db_name=?1 AND table_name=?2",
                params![db_name, table_name],
            )
            .map_err(|e| MetabenchError::query(e.to_string()))?;
        if affected == 0 {
            return Err(MetabenchError::not_found(format!(
                "table {db_name}.{table_name}"
            )));
        }
        notify(&tx, "DROP_TABLE", db_name, Some(table_name))?;
        commit(tx)
    }

    fn add_partition(&self, partition: &Partition) -> Result<(), MetabenchError> {
        self.add_partitions(std::slice::from_ref(partition))
    }

    fn add_partitions(&self, partitions: &[Partition]) -> Result<(), MetabenchError> {
        let tx = self.write_tx()?;
        for partition in partitions {
            insert_partition(&tx, partition)?;
        }
        if let Some(first) = partitions.first() {
            notify(&tx, "ADD_PARTITION", &first.db_name, Some(&first.table_name))?;
        }
        commit(tx)
    }

    fn get_partitions(
        &self,
        db_name: &str,
        table_name: &str,
    ) -> Result<Vec<Partition>, MetabenchError> {
        if fetch_table(&self.conn, db_name, table_name)?.is_none() {
            return Err(MetabenchError::not_found(format!(
                "table {db_name}.{table_name}"
            )));
        }
        let mut stmt = self
            .conn
            .prepare_cached(
                "SELECT db_name, table_name, part_vals, location FROM ms_partitions
                 WHERE db_name=?1 AND table_name=?2 ORDER BY rowid",
            )
            .map_err(|e| MetabenchError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![db_name, table_name], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| MetabenchError::query(e.to_string()))?;
        let mut partitions = Vec::new();
        for row in rows {
            let (db_name, table_name, values, location) =
                row.map_err(|e| MetabenchError::query(e.to_string()))?;
            partitions.push(Partition {
                db_name,
                table_name,
                values: from_json(&values)?,
                location,
            });
        }
        Ok(partitions)
    }

    fn drop_partition(
        &self,
        db_name: &str,
        table_name: &str,
        values: &[String],
    ) -> Result<(), MetabenchError> {
        let table = self.get_table(db_name, table_name)?;
        let name = partition_name(&table, values)?;
        self.drop_partitions(db_name, table_name, &[name])
    }

    fn drop_partitions(
        &self,
        db_name: &str,
        table_name: &str,
        names: &[String],
    ) -> Result<(), MetabenchError> {
        let tx = self.write_tx()?;
        for name in names {
            let affected = tx
                .execute(
                    "DELETE FROM ms_partitions WHERE db_name=?1 AND table_name=?2 AND part_name=?3",
                    params![db_name, table_name, name.as_str()],
                )
                .map_err(|e| MetabenchError::query(e.to_string()))?;
            if affected == 0 {
                return Err(MetabenchError::not_found(format!(
                    "partition {db_name}.{table_name}/{name}"
                )));
            }
        }
        notify(&tx, "DROP_PARTITION", db_name, Some(table_name))?;
        commit(tx)
    }
}

fn commit(tx: Transaction<'_>) -> Result<(), MetabenchError> {
    tx.commit().map_err(|e| MetabenchError::query(e.to_string()))
}

fn notify(
    conn: &Connection,
    event: &str,
    db_name: &str,
    table_name: Option<&str>,
) -> Result<(), MetabenchError> {
    conn.execute(
        "INSERT INTO ms_notifications(event, db_name, table_name) VALUES(?1, ?2, ?3)",
        params![event, db_name, table_name],
    )
    .map_err(|e| MetabenchError::query(e.to_string()))?;
    Ok(())
}

fn database_exists(conn: &Connection, name: &str) -> Result<bool, MetabenchError> {
    conn.query_row(
        "SELECT 1 FROM ms_databases WHERE name=?1",
        params![name],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| MetabenchError::query(e.to_string()))
}

fn fetch_table(
    conn: &Connection,
    db_name: &str,
    table_name: &str,
) -> Result<Option<Table>, MetabenchError> {
    let raw = conn
        .query_row(
            "SELECT db_name, table_name, owner, table_type, location, columns, partition_keys
             FROM ms_tables WHERE db_name=?1 AND table_name=?2",
            params![db_name, table_name],
            row_to_raw_table,
        )
        .optional()
        .map_err(|e| MetabenchError::query(e.to_string()))?;
    raw.map(RawTable::into_table).transpose()
}

struct RawTable {
    db_name: String,
    table_name: String,
    owner: Option<String>,
    table_type: String,
    location: String,
    columns: String,
    partition_keys: String,
}

impl RawTable {
    fn into_table(self) -> Result<Table, MetabenchError> {
        Ok(Table {
            db_name: self.db_name,
            table_name: self.table_name,
            owner: self.owner,
            table_type: TableType::parse(&self.table_type)?,
            location: self.location,
            columns: from_json(&self.columns)?,
            partition_keys: from_json(&self.partition_keys)?,
        })
    }
}

fn row_to_raw_table(row: &Row<'_>) -> rusqlite::Result<RawTable> {
    Ok(RawTable {
        db_name: row.get(0)?,
        table_name: row.get(1)?,
        owner: row.get(2)?,
        table_type: row.get(3)?,
        location: row.get(4)?,
        columns: row.get(5)?,
        partition_keys: row.get(6)?,
    })
}

fn insert_partition(conn: &Connection, partition: &Partition) -> Result<(), MetabenchError> {
    let table = fetch_table(conn, &partition.db_name, &partition.table_name)?.ok_or_else(|| {
        MetabenchError::not_found(format!(
            "table {}.{}",
            partition.db_name, partition.table_name
        ))
    })?;
    let name = partition_name(&table, &partition.values)?;
    let exists = conn
        .query_row(
            "SELECT 1 FROM ms_partitions WHERE db_name=?1 AND table_name=?2 AND part_name=?3",
            params![
                partition.db_name.as_str(),
                partition.table_name.as_str(),
                name.as_str()
            ],
            |_| Ok(()),
        )
        .optional()
        .map_err(|e| MetabenchError::query(e.to_string()))?
        .is_some();
    if exists {
        return Err(MetabenchError::already_exists(format!(
            "partition {}.{}/{name}",
            partition.db_name, partition.table_name
        )));
    }
    let location = if partition.location.is_empty() {
        format!("{}/{name}", table.location)
    } else {
        partition.location.clone()
    };
    conn.execute(
        "INSERT INTO ms_partitions(db_name, table_name, part_name, part_vals, location)
         VALUES(?1, ?2, ?3, ?4, ?5)",
        params![
            partition.db_name.as_str(),
            partition.table_name.as_str(),
            name,
            to_json(&partition.values)?,
            location,
        ],
    )
    .map_err(|e| MetabenchError::query(e.to_string()))?;
    Ok(())
}

fn collect_names<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<String>, MetabenchError> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(|e| MetabenchError::query(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| row.get(0))
        .map_err(|e| MetabenchError::query(e.to_string()))?;
    let mut names = Vec::new();
    for row in rows {
        names.push(row.map_err(|e| MetabenchError::query(e.to_string()))?);
    }
    Ok(names)
}

fn table_location(table: &Table) -> String {
    if table.location.is_empty() {
        format!(
            "{WAREHOUSE_ROOT}/{}.db/{}",
            table.db_name, table.table_name
        )
    } else {
        table.location.clone()
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, MetabenchError> {
    serde_json::to_string(value).map_err(|e| MetabenchError::invalid_input(e.to_string()))
}

fn from_json<T: serde::de::DeserializeOwned>(data: &str) -> Result<T, MetabenchError> {
    serde_json::from_str(data).map_err(|e| MetabenchError::schema(e.to_string()))
}
