//! Metastore data model and the client contract benchmarks are written against.

use serde::{Deserialize, Serialize};

use crate::errors::MetabenchError;

/// Column type assumed when a schema entry omits one.
pub const DEFAULT_COLUMN_TYPE: &str = "string";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    pub type_name: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableType {
    #[default]
    Managed,
    External,
}

impl TableType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TableType::Managed => "MANAGED_TABLE",
            TableType::External => "EXTERNAL_TABLE",
        }
    }

    pub fn parse(value: &str) -> Result<Self, MetabenchError> {
        match value {
            "MANAGED_TABLE" => Ok(TableType::Managed),
            "EXTERNAL_TABLE" => Ok(TableType::External),
            other => Err(MetabenchError::invalid_input(format!(
                "unknown table type {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    pub name: String,
    pub description: Option<String>,
    pub owner: Option<String>,
    pub location: Option<String>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub db_name: String,
    pub table_name: String,
    pub owner: Option<String>,
    pub table_type: TableType,
    pub location: String,
    pub columns: Vec<FieldSchema>,
    pub partition_keys: Vec<FieldSchema>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    pub db_name: String,
    pub table_name: String,
    pub values: Vec<String>,
    pub location: String,
}

#[derive(Clone, Debug)]
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new(db_name: &str, table_name: &str) -> Self {
        Self {
            table: Table {
                db_name: db_name.to_string(),
                table_name: table_name.to_string(),
                ..Table::default()
            },
        }
    }

    pub fn with_owner(mut self, owner: &str) -> Self {
        self.table.owner = Some(owner.to_string());
        self
    }

    pub fn with_columns(mut self, columns: Vec<FieldSchema>) -> Self {
        self.table.columns = columns;
        self
    }

    pub fn with_partition_keys(mut self, keys: Vec<FieldSchema>) -> Self {
        self.table.partition_keys = keys;
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.table.location = location.to_string();
        self
    }

    pub fn with_type(mut self, table_type: TableType) -> Self {
        self.table.table_type = table_type;
        self
    }

    pub fn build(self) -> Table {
        self.table
    }
}

/// Parses `name=type,name,...` into columns; a missing type is `string`.
pub fn parse_schema(arg: &str) -> Vec<FieldSchema> {
    arg.split(',')
        .map(str::trim)
        .filter(|field| !field.is_empty())
        .map(|field| match field.split_once('=') {
            Some((name, type_name)) => FieldSchema::new(name, type_name),
            None => FieldSchema::new(field, DEFAULT_COLUMN_TYPE),
        })
        .collect()
}

/// `key1=value1/key2=value2` for the table's partition keys.
pub fn partition_name(table: &Table, values: &[String]) -> Result<String, MetabenchError> {
    if table.partition_keys.len() != values.len() {
        return Err(MetabenchError::invalid_input(format!(
            "number of provided partition values {} does not match partition schema which has {} columns",
            values.len(),
            table.partition_keys.len()
        )));
    }
    Ok(table
        .partition_keys
        .iter()
        .zip(values)
        .map(|(key, value)| format!("{}={value}", key.name))
        .collect::<Vec<_>>()
        .join("/"))
}

/// Builds a partition of `table` whose location nests under the table's.
pub fn make_partition(table: &Table, values: &[String]) -> Result<Partition, MetabenchError> {
    let name = partition_name(table, values)?;
    Ok(Partition {
        db_name: table.db_name.clone(),
        table_name: table.table_name.clone(),
        values: values.to_vec(),
        location: format!("{}/{name}", table.location),
    })
}

/// Client for a metastore service.
///
/// A handle is not assumed to be safe for concurrent use; concurrent work
/// obtains one handle per worker through [`Metastore::try_clone`].
pub trait Metastore: Sized {
    /// Opens an independent handle to the same service.
    fn try_clone(&self) -> Result<Self, MetabenchError>;
    fn current_notification_id(&self) -> Result<i64, MetabenchError>;

    fn all_databases(&self) -> Result<Vec<String>, MetabenchError>;
    fn get_database(&self, name: &str) -> Result<Database, MetabenchError>;
    fn create_database(&self, database: &Database) -> Result<(), MetabenchError>;
    fn drop_database(&self, name: &str, cascade: bool) -> Result<(), MetabenchError>;

    fn all_tables(&self, db_name: &str) -> Result<Vec<String>, MetabenchError>;
    fn get_table(&self, db_name: &str, table_name: &str) -> Result<Table, MetabenchError>;
    fn create_table(&self, table: &Table) -> Result<(), MetabenchError>;
    /// Replaces the definition of `db_name.table_name`; a changed table name renames it.
    fn alter_table(
        &self,
        db_name: &str,
        table_name: &str,
        table: &Table,
    ) -> Result<(), MetabenchError>;
    fn drop_table(&self, db_name: &str, table_name: &str) -> Result<(), MetabenchError>;

    fn add_partition(&self, partition: &Partition) -> Result<(), MetabenchError>;
    fn add_partitions(&self, partitions: &[Partition]) -> Result<(), MetabenchError>;
    fn get_partitions(
        &self,
        db_name: &str,
        table_name: &str,
    ) -> Result<Vec<Partition>, MetabenchError>;
    fn drop_partition(
        &self,
        db_name: &str,
        table_name: &str,
        values: &[String],
    ) -> Result<(), MetabenchError>;
    /// Drops partitions by name (`key=value/...`).
    fn drop_partitions(
        &self,
        db_name: &str,
        table_name: &str,
        names: &[String],
    ) -> Result<(), MetabenchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_schema_defaults_to_string() {
        let schema = parse_schema("name,age=int");
        assert_eq!(
            schema,
            vec![FieldSchema::new("name", "string"), FieldSchema::new("age", "int")]
        );
        assert!(parse_schema("").is_empty());
    }

    #[test]
    fn test_make_partition_nests_location() {
        let table = TableBuilder::new("db", "table")
            .with_partition_keys(parse_schema("date"))
            .with_location("/home")
            .build();
        let partition = make_partition(&table, &["d1".to_string()]).expect("partition");
        assert_eq!(partition.location, "/home/date=d1");
        assert!(make_partition(&table, &[]).is_err());
    }
}
