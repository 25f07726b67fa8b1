use rusqlite::Connection;

use crate::errors::MetabenchError;

pub fn ensure_schema(conn: &Connection) -> Result<(), MetabenchError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS ms_databases (
            name        TEXT PRIMARY KEY,
            description TEXT,
            owner       TEXT,
            location    TEXT
        );
        CREATE TABLE IF NOT EXISTS ms_tables (
            db_name        TEXT NOT NULL REFERENCES ms_databases(name),
            table_name     TEXT NOT NULL,
            owner          TEXT,
            table_type     TEXT NOT NULL,
            location       TEXT NOT NULL,
            columns        TEXT NOT NULL,
            partition_keys TEXT NOT NULL,
            PRIMARY KEY (db_name, table_name)
        );
        CREATE TABLE IF NOT EXISTS ms_partitions (
            db_name    TEXT NOT NULL,
            table_name TEXT NOT NULL,
            part_name  TEXT NOT NULL,
            part_vals  TEXT NOT NULL,
            location   TEXT NOT NULL,
            PRIMARY KEY (db_name, table_name, part_name)
        );
        CREATE TABLE IF NOT EXISTS ms_notifications (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            event      TEXT NOT NULL,
            db_name    TEXT NOT NULL,
            table_name TEXT
        );
        "#,
    )
    .map_err(|e| MetabenchError::schema(e.to_string()))?;
    Ok(())
}
