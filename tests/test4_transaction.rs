use sqlite_thin::Connection;
use sqlite_thin::ffi::SQLITE_OK;

fn table_count(conn: &Connection) -> Result<i64, Box<dyn std::error::Error>> {
    let mut query = conn.query("SELECT count(*) FROM t")?;
    Ok(query.fetchone()?.get::<i64>(0))
}

#[test]
fn commit_makes_writes_visible() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    let txn = conn.transaction(false, false);
    conn.execute("INSERT INTO t VALUES (1)")?;
    assert_eq!(txn.commit(), SQLITE_OK);

    assert_eq!(table_count(&conn)?, 1);
    Ok(())
}

#[test]
fn rollback_discards_writes() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    let txn = conn.transaction(false, false);
    conn.execute("INSERT INTO t VALUES (1)")?;
    assert_eq!(txn.rollback(), SQLITE_OK);

    assert_eq!(table_count(&conn)?, 0);
    Ok(())
}

#[test]
fn drop_defaults_to_rollback() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    {
        let _txn = conn.transaction(false, false);
        conn.execute("INSERT INTO t VALUES (1)")?;
    }

    assert_eq!(table_count(&conn)?, 0);
    Ok(())
}

#[test]
fn drop_commits_when_asked() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    {
        let _txn = conn.transaction(true, false);
        conn.execute("INSERT INTO t VALUES (1)")?;
    }

    assert_eq!(table_count(&conn)?, 1);
    Ok(())
}

#[test]
fn reserve_takes_the_write_lock_up_front() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("locked.db");
    let path = path.to_str().unwrap();

    let writer = Connection::open(path)?;
    writer.execute("CREATE TABLE t (x INTEGER)")?;

    let txn = writer.transaction(false, true);
    // The reserved lock is already held, so a second writer cannot begin.
    let other = Connection::open(path)?;
    assert_ne!(other.eexecute("BEGIN IMMEDIATE"), SQLITE_OK);

    assert_eq!(txn.rollback(), SQLITE_OK);
    assert_eq!(other.eexecute("BEGIN IMMEDIATE"), SQLITE_OK);
    assert_eq!(other.eexecute("ROLLBACK"), SQLITE_OK);
    Ok(())
}

#[test]
fn begin_failure_surfaces_through_terminator() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("BEGIN")?;

    // The scope's own BEGIN fails (a transaction is already open); the
    // constructor stays silent and the terminator acts on the outer one.
    let txn = conn.transaction(false, false);
    assert_eq!(txn.rollback(), SQLITE_OK);

    // No transaction is left behind.
    assert_ne!(conn.eexecute("ROLLBACK"), SQLITE_OK);
    Ok(())
}
