use contacts_core::db::migrations::latest_version;
use contacts_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    for table in [
        "addressbooks",
        "persons",
        "contacts",
        "names",
        "numbers",
        "emails",
        "addresses",
        "speeddials",
        "db_version",
        "change_log",
    ] {
        assert_table_exists(&conn, table);
    }
}

#[test]
fn fresh_store_has_default_addressbook_and_version_zero() {
    let conn = open_db_in_memory().unwrap();

    let name: String = conn
        .query_row("SELECT name FROM addressbooks WHERE id = 0;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(name, "phone");

    let version: i64 = conn
        .query_row("SELECT version FROM db_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, 0);
}

#[test]
fn reopening_a_store_keeps_its_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("contacts.sqlite3");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute("UPDATE db_version SET version = 7;", [])
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let version: i64 = conn_second
        .query_row("SELECT version FROM db_version;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, 7);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    match open_db(&path).unwrap_err() {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
