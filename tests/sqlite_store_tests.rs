use metabench::{
    MetabenchError, Metastore, SqliteMetastore,
    metastore::{Database, Table, TableBuilder, TableType, make_partition, parse_schema},
    sqlite_store::StoreSource,
};
use tempfile::TempDir;

fn store_with_db(name: &str) -> SqliteMetastore {
    let store = SqliteMetastore::open_in_memory().expect("store");
    store.create_database(&Database::new(name)).expect("create db");
    store
}

fn partitioned(db: &str, table: &str) -> Table {
    TableBuilder::new(db, table)
        .with_owner("tester")
        .with_columns(parse_schema("name,size=int"))
        .with_partition_keys(parse_schema("date"))
        .build()
}

fn values(value: &str) -> Vec<String> {
    vec![value.to_string()]
}

#[test]
fn test_schema_tables_exist() {
    let store = SqliteMetastore::open_in_memory().expect("store");
    let conn = store.connection();
    for table in ["ms_databases", "ms_tables", "ms_partitions", "ms_notifications"] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .expect("query");
        assert_eq!(count, 1, "missing {table}");
    }
}

#[test]
fn test_database_lifecycle() {
    let store = SqliteMetastore::open_in_memory().expect("store");
    assert!(store.all_databases().expect("list").is_empty());

    let mut db = Database::new("sales");
    db.owner = Some("alice".into());
    store.create_database(&db).expect("create");
    let fetched = store.get_database("sales").expect("get");
    assert_eq!(fetched.owner.as_deref(), Some("alice"));
    assert_eq!(fetched.location.as_deref(), Some("/warehouse/sales.db"));

    store.create_database(&Database::new("archive")).expect("create");
    assert_eq!(store.all_databases().expect("list"), vec!["archive", "sales"]);

    store.drop_database("sales", false).expect("drop");
    assert!(matches!(
        store.get_database("sales"),
        Err(MetabenchError::NotFound(_))
    ));
}

#[test]
fn test_duplicate_and_missing_database_errors() {
    let store = store_with_db("db");
    assert!(matches!(
        store.create_database(&Database::new("db")),
        Err(MetabenchError::AlreadyExists(_))
    ));
    assert!(matches!(
        store.drop_database("missing", true),
        Err(MetabenchError::NotFound(_))
    ));
    assert!(matches!(
        store.create_database(&Database::new("  ")),
        Err(MetabenchError::InvalidInput(_))
    ));
}

#[test]
fn test_drop_non_empty_database_requires_cascade() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "t")).expect("table");
    let table = store.get_table("db", "t").expect("get");
    store
        .add_partition(&make_partition(&table, &values("d1")).expect("partition"))
        .expect("add");

    assert!(matches!(
        store.drop_database("db", false),
        Err(MetabenchError::InvalidInput(_))
    ));
    store.drop_database("db", true).expect("cascade");
    assert!(store.all_databases().expect("list").is_empty());

    store.create_database(&Database::new("db")).expect("recreate");
    assert!(store.all_tables("db").expect("tables").is_empty());
}

#[test]
fn test_table_lifecycle() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "b")).expect("create");
    store
        .create_table(
            &TableBuilder::new("db", "a")
                .with_type(TableType::External)
                .with_location("/data/a")
                .build(),
        )
        .expect("create");

    assert_eq!(store.all_tables("db").expect("list"), vec!["a", "b"]);
    let b = store.get_table("db", "b").expect("get");
    assert_eq!(b.location, "/warehouse/db.db/b");
    assert_eq!(b.columns, parse_schema("name,size=int"));
    assert_eq!(b.partition_keys, parse_schema("date"));
    assert_eq!(b.owner.as_deref(), Some("tester"));
    let a = store.get_table("db", "a").expect("get");
    assert_eq!(a.table_type, TableType::External);
    assert_eq!(a.location, "/data/a");

    store.drop_table("db", "a").expect("drop");
    assert_eq!(store.all_tables("db").expect("list"), vec!["b"]);
    assert!(matches!(
        store.drop_table("db", "a"),
        Err(MetabenchError::NotFound(_))
    ));
}

#[test]
fn test_table_errors() {
    let store = store_with_db("db");
    assert!(matches!(
        store.create_table(&partitioned("missing", "t")),
        Err(MetabenchError::NotFound(_))
    ));
    store.create_table(&partitioned("db", "t")).expect("create");
    assert!(matches!(
        store.create_table(&partitioned("db", "t")),
        Err(MetabenchError::AlreadyExists(_))
    ));
    assert!(matches!(
        store.get_table("db", "nope"),
        Err(MetabenchError::NotFound(_))
    ));
    assert!(matches!(
        store.all_tables("missing"),
        Err(MetabenchError::NotFound(_))
    ));
}

#[test]
fn test_partitions_keep_insertion_order() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "t")).expect("create");
    let table = store.get_table("db", "t").expect("get");
    let batch: Vec<_> = ["d3", "d1", "d2"]
        .iter()
        .map(|v| make_partition(&table, &values(v)).expect("partition"))
        .collect();
    store.add_partitions(&batch).expect("add");

    let stored = store.get_partitions("db", "t").expect("list");
    assert_eq!(stored, batch);
    assert_eq!(stored[0].location, "/warehouse/db.db/t/date=d3");
}

#[test]
fn test_partition_errors() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "t")).expect("create");
    let table = store.get_table("db", "t").expect("get");
    let partition = make_partition(&table, &values("d1")).expect("partition");
    store.add_partition(&partition).expect("add");

    assert!(matches!(
        store.add_partition(&partition),
        Err(MetabenchError::AlreadyExists(_))
    ));
    let mut wrong_arity = partition.clone();
    wrong_arity.values.push("extra".into());
    assert!(matches!(
        store.add_partition(&wrong_arity),
        Err(MetabenchError::InvalidInput(_))
    ));
    assert!(matches!(
        store.drop_partition("db", "t", &values("d9")),
        Err(MetabenchError::NotFound(_))
    ));
    assert!(matches!(
        store.get_partitions("db", "missing"),
        Err(MetabenchError::NotFound(_))
    ));
}

#[test]
fn test_failed_batch_adds_nothing() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "t")).expect("create");
    let table = store.get_table("db", "t").expect("get");
    let first = make_partition(&table, &values("d1")).expect("partition");
    let result = store.add_partitions(&[first.clone(), first]);
    assert!(matches!(result, Err(MetabenchError::AlreadyExists(_))));
    assert!(store.get_partitions("db", "t").expect("list").is_empty());
}

#[test]
fn test_drop_partition_by_values_and_names() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "t")).expect("create");
    let table = store.get_table("db", "t").expect("get");
    for v in ["d1", "d2", "d3"] {
        store
            .add_partition(&make_partition(&table, &values(v)).expect("partition"))
            .expect("add");
    }

    store.drop_partition("db", "t", &values("d2")).expect("drop");
    store
        .drop_partitions("db", "t", &["date=d1".to_string()])
        .expect("drop by name");
    let left: Vec<_> = store
        .get_partitions("db", "t")
        .expect("list")
        .into_iter()
        .map(|p| p.values)
        .collect();
    assert_eq!(left, vec![values("d3")]);
}

#[test]
fn test_rename_table_moves_partitions() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "old")).expect("create");
    let table = store.get_table("db", "old").expect("get");
    store
        .add_partition(&make_partition(&table, &values("d1")).expect("partition"))
        .expect("add");

    let mut renamed = table.clone();
    renamed.table_name = "new".into();
    store.alter_table("db", "old", &renamed).expect("rename");

    assert!(matches!(
        store.get_table("db", "old"),
        Err(MetabenchError::NotFound(_))
    ));
    let partitions = store.get_partitions("db", "new").expect("list");
    assert_eq!(partitions.len(), 1);
    assert_eq!(partitions[0].table_name, "new");
}

#[test]
fn test_alter_table_rejects_conflicts() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "a")).expect("create");
    store.create_table(&partitioned("db", "b")).expect("create");
    let a = store.get_table("db", "a").expect("get");

    let mut clash = a.clone();
    clash.table_name = "b".into();
    assert!(matches!(
        store.alter_table("db", "a", &clash),
        Err(MetabenchError::AlreadyExists(_))
    ));
    let mut moved = a.clone();
    moved.db_name = "other".into();
    assert!(matches!(
        store.alter_table("db", "a", &moved),
        Err(MetabenchError::InvalidInput(_))
    ));
    assert!(matches!(
        store.alter_table("db", "missing", &partitioned("db", "missing")),
        Err(MetabenchError::NotFound(_))
    ));
}

#[test]
fn test_notification_id_advances_on_mutation() {
    let store = SqliteMetastore::open_in_memory().expect("store");
    let start = store.current_notification_id().expect("id");
    assert_eq!(start, 0);
    store.create_database(&Database::new("db")).expect("create");
    let after_create = store.current_notification_id().expect("id");
    assert!(after_create > start);
    store.all_databases().expect("list");
    assert_eq!(store.current_notification_id().expect("id"), after_create);
    store.drop_database("db", false).expect("drop");
    assert!(store.current_notification_id().expect("id") > after_create);
}

#[test]
fn test_in_memory_clone_shares_data() {
    let store = SqliteMetastore::open_in_memory().expect("store");
    let clone = store.try_clone().expect("clone");
    assert!(matches!(clone.source(), StoreSource::Scratch(_)));
    assert_eq!(clone.source(), store.source());
    store.create_database(&Database::new("shared")).expect("create");
    assert_eq!(clone.all_databases().expect("list"), vec!["shared"]);

    let other = SqliteMetastore::open_in_memory().expect("store");
    assert_ne!(other.source(), store.source());
    assert!(other.all_databases().expect("list").is_empty());
}

#[test]
fn test_scratch_store_lives_until_last_handle() {
    let store = SqliteMetastore::open_location("memory").expect("store");
    let path = store.source().path().to_path_buf();
    let clone = store.try_clone().expect("clone");
    drop(store);
    assert!(path.exists());
    clone.create_database(&Database::new("kept")).expect("create");
    assert_eq!(clone.all_databases().expect("list"), vec!["kept"]);
    drop(clone);
    assert!(!path.exists());
}

#[test]
fn test_scratch_store_serializes_concurrent_writers() {
    let store = store_with_db("db");
    store.create_table(&partitioned("db", "t")).expect("create");
    let table = store.get_table("db", "t").expect("get");
    let before = store.current_notification_id().expect("id");
    let clients: Vec<SqliteMetastore> = (0..4)
        .map(|_| store.try_clone().expect("clone"))
        .collect();
    std::thread::scope(|scope| {
        for (worker, client) in clients.into_iter().enumerate() {
            let table = &table;
            scope.spawn(move || {
                for round in 0..10 {
                    let value = values(&format!("w{worker}_{round}"));
                    let partition = make_partition(table, &value).expect("partition");
                    client.add_partition(&partition).expect("add");
                }
            });
        }
    });
    assert_eq!(store.get_partitions("db", "t").expect("list").len(), 40);
    assert_eq!(store.current_notification_id().expect("id") - before, 40);
}

#[test]
fn test_file_store_persists_and_clones() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("metastore.db");
    {
        let store = SqliteMetastore::open(&path).expect("open");
        let clone = store.try_clone().expect("clone");
        clone.create_database(&Database::new("kept")).expect("create");
        assert_eq!(store.all_databases().expect("list"), vec!["kept"]);
    }
    let reopened =
        SqliteMetastore::open_location(path.to_str().expect("utf8 path")).expect("reopen");
    assert_eq!(reopened.get_database("kept").expect("get").name, "kept");
    let journal: String = reopened
        .connection()
        .query_row("PRAGMA journal_mode", [], |row| row.get(0))
        .expect("pragma");
    assert_eq!(journal.to_lowercase(), "wal");
}
