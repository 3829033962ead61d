use diarybell_core::db::migrations::latest_version;
use diarybell_core::db::{compact_db, open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "settings");
    assert_table_exists(&conn, "diary_entries");
}

#[test]
fn open_db_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("data").join("diary.db");

    let conn = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn), latest_version());
    assert!(path.exists());
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");

    let conn_first = open_db(&path).unwrap();
    conn_first
        .execute(
            "INSERT INTO diary_entries (id, date, last_modified)
             VALUES ('a', '2024-05-10', '2024-05-10T10:00:00+00:00');",
            [],
        )
        .unwrap();
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    let count: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM diary_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
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

#[test]
fn diary_dates_are_unique() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO diary_entries (id, date, last_modified)
                  VALUES (?1, '2024-05-10', '2024-05-10T10:00:00+00:00');";

    conn.execute(insert, ["first"]).unwrap();
    assert!(conn.execute(insert, ["second"]).is_err());
}

#[test]
fn settings_table_holds_a_single_row() {
    let conn = open_db_in_memory().unwrap();
    let insert = "INSERT INTO settings (
                      id, user_name, assistant_name, selected_assistant_id,
                      notification_frequency_minutes, notification_start, notification_end,
                      font_family, font_size
                  ) VALUES (?1, 'u', 'a', 'a', 5, '09:00:00', '01:00:00', 'f', 16.0);";

    conn.execute(insert, [1]).unwrap();
    assert!(conn.execute(insert, [2]).is_err());
}

#[test]
fn compact_db_keeps_data_and_passes_integrity_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");

    let conn = open_db(&path).unwrap();
    conn.execute(
        "INSERT INTO diary_entries (id, date, last_modified)
         VALUES ('a', '2024-05-10', '2024-05-10T10:00:00+00:00');",
        [],
    )
    .unwrap();
    drop(conn);

    compact_db(&path).unwrap();

    let conn = open_db(&path).unwrap();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM diary_entries;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn compact_db_fails_for_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(compact_db(dir.path().join("missing.db")).is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
