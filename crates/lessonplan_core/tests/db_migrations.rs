use lessonplan_core::db::migrations::{latest_version, schema_version};
use lessonplan_core::db::{open_db, open_db_in_memory, DbError};
use rusqlite::Connection;

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn).unwrap(), latest_version());
    assert_table_exists(&conn, "lesson_notes");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("lessonplan.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first).unwrap(), latest_version());
    insert_note(&conn_first, "n-1");
    drop(conn_first);

    let conn_second = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_second).unwrap(), latest_version());
    let rows: i64 = conn_second
        .query_row("SELECT COUNT(*) FROM lesson_notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

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
fn store_path_under_a_regular_file_reports_io_cause() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("notes");
    std::fs::write(&blocker, "not a directory").unwrap();

    let err = open_db(blocker.join("lessonplan.sqlite3")).unwrap_err();
    match &err {
        DbError::Io { path, .. } => assert_eq!(path, &blocker),
        other => panic!("unexpected error: {other}"),
    }
    assert!(std::error::Error::source(&err).is_some());
}

#[test]
fn failed_migration_names_its_version_and_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.sqlite3");
    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE lesson_notes (id INTEGER PRIMARY KEY);")
        .unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    assert!(matches!(err, DbError::Migration { version: 1, .. }));
    assert!(err.to_string().contains("migration 1"));

    let conn = Connection::open(&path).unwrap();
    assert_eq!(schema_version(&conn).unwrap(), 0);
}

#[test]
fn lesson_notes_rejects_update_and_delete() {
    let conn = open_db_in_memory().unwrap();
    insert_note(&conn, "n-1");

    let update = conn.execute("UPDATE lesson_notes SET memo = 'edited';", []);
    assert!(update.unwrap_err().to_string().contains("append-only"));
    assert!(conn.execute("DELETE FROM lesson_notes;", []).is_err());

    let memo: String = conn
        .query_row("SELECT memo FROM lesson_notes;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(memo, "original");
}

#[test]
fn note_ids_are_unique() {
    let conn = open_db_in_memory().unwrap();
    insert_note(&conn, "n-1");
    let duplicate = conn.execute(
        "INSERT INTO lesson_notes (note_id, school_level, grade, unit, subunit, lesson, created_at)
         VALUES ('n-1', '小学校', '5', '月と星', '月の満ち欠け', '観察', '2026-06-01 13:45:00');",
        [],
    );
    assert!(duplicate.is_err());
}

fn insert_note(conn: &Connection, note_id: &str) {
    conn.execute(
        "INSERT INTO lesson_notes (note_id, school_level, grade, unit, subunit, lesson, memo, created_at)
         VALUES (?1, '小学校', '5', '月と星', '月の満ち欠け', '観察', 'original', '2026-06-01 13:45:00');",
        [note_id],
    )
    .unwrap();
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
