use sqlite_thin::ffi::{SQLITE_CANTOPEN, SQLITE_MISUSE, SQLITE_OK, SQLITE_OPEN_READONLY};
use sqlite_thin::{Connection, Value};

#[test]
fn open_execute_and_introspect() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER, y TEXT)")?;
    conn.execute("INSERT INTO t VALUES (1, 'one')")?;

    assert_eq!(conn.last_insert_rowid(), 1);
    assert_eq!(conn.changes(), 1);

    conn.execute("INSERT INTO t VALUES (2, 'two'); INSERT INTO t VALUES (3, 'three')")?;
    assert_eq!(conn.last_insert_rowid(), 3);
    Ok(())
}

#[test]
fn raw_status_and_error_text() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;

    let rc = conn.eexecute("NOT VALID SQL");
    assert_ne!(rc, SQLITE_OK);
    assert_ne!(conn.error_code(), SQLITE_OK);
    assert!(conn.error_message().contains("syntax error"));

    let err = conn.execute("ALSO NOT SQL").unwrap_err();
    assert!(err.message().contains("syntax error"));

    // The connection stays usable after a failed statement.
    conn.execute("CREATE TABLE ok (x)")?;
    Ok(())
}

#[test]
fn executef_uses_engine_quoting() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE people (name TEXT)")?;

    let rc = conn.executef(
        "INSERT INTO people VALUES ('%q')",
        &[Value::Text("O'Brien")],
    );
    assert_eq!(rc, SQLITE_OK);

    let mut query = conn.query("SELECT name FROM people")?;
    let row = query.fetchone()?;
    assert_eq!(row.get::<String>(0), "O'Brien");
    Ok(())
}

#[test]
fn executef_releases_buffer_on_failure() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    // Renders fine, fails at execution; must not leak or crash.
    let rc = conn.executef("INSERT INTO missing VALUES ('%q')", &[Value::Text("x")]);
    assert_ne!(rc, SQLITE_OK);
    Ok(())
}

#[test]
fn close_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Connection::open(":memory:")?;
    assert_eq!(conn.disconnect(), SQLITE_OK);
    assert_eq!(conn.disconnect(), SQLITE_OK);
    conn.close()?;
    Ok(())
}

#[test]
fn reconnect_closes_previous_handle() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("first.db");

    let mut conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE scratch (x)")?;

    let rc = conn.connect(path.to_str().unwrap());
    assert_eq!(rc, SQLITE_OK);
    // The in-memory table is gone with the old handle.
    assert!(conn.query("SELECT * FROM scratch").is_err());
    conn.execute("CREATE TABLE persisted (x)")?;
    Ok(())
}

#[test]
fn open_with_flags_readonly() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ro.db");
    let path = path.to_str().unwrap();

    {
        let conn = Connection::open(path)?;
        conn.execute("CREATE TABLE t (x INTEGER)")?;
        conn.execute("INSERT INTO t VALUES (7)")?;
    }

    let mut conn = Connection::new();
    let rc = conn.connect_with_flags(path, SQLITE_OPEN_READONLY, None);
    assert_eq!(rc, SQLITE_OK);

    let mut query = conn.query("SELECT x FROM t")?;
    assert_eq!(query.fetchone()?.get::<i64>(0), 7);
    assert!(conn.execute("INSERT INTO t VALUES (8)").is_err());
    Ok(())
}

#[test]
fn open_with_flags_missing_file_fails() {
    let mut conn = Connection::new();
    let rc = conn.connect_with_flags("/nonexistent/nope.db", SQLITE_OPEN_READONLY, None);
    assert_eq!(rc, SQLITE_CANTOPEN);
}

#[test]
fn attach_and_detach() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let other = dir.path().join("other.db");
    let other = other.to_str().unwrap();

    {
        let conn = Connection::open(other)?;
        conn.execute("CREATE TABLE sidecar (x INTEGER)")?;
        conn.execute("INSERT INTO sidecar VALUES (99)")?;
    }

    let conn = Connection::open(":memory:")?;
    assert_eq!(conn.attach(other, "aux"), SQLITE_OK);
    let mut query = conn.query("SELECT x FROM aux.sidecar")?;
    assert_eq!(query.fetchone()?.get::<i64>(0), 99);
    drop(query);
    assert_eq!(conn.detach("aux"), SQLITE_OK);
    assert!(conn.query("SELECT x FROM aux.sidecar").is_err());
    Ok(())
}

#[test]
fn introspection_on_closed_connection_is_harmless() {
    let mut conn = Connection::new();
    assert_eq!(conn.set_busy_timeout(100), SQLITE_MISUSE);
    assert_eq!(conn.last_insert_rowid(), 0);
    assert_eq!(conn.changes(), 0);
    assert_eq!(conn.error_code(), SQLITE_MISUSE);
    assert_eq!(conn.error_message(), "not connected");
    // Same surface after an explicit disconnect.
    assert_eq!(conn.connect(":memory:"), SQLITE_OK);
    conn.disconnect();
    assert_eq!(conn.set_busy_timeout(100), SQLITE_MISUSE);
    assert_eq!(conn.changes(), 0);
}

#[test]
fn busy_timeout_accepts_value() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    assert_eq!(conn.set_busy_timeout(250), SQLITE_OK);
    assert_eq!(conn.set_busy_timeout(0), SQLITE_OK);
    Ok(())
}
