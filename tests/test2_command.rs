use sqlite_thin::ffi::{SQLITE_OK, SQLITE_ROW};
use sqlite_thin::{Command, Connection, Value};

#[test]
fn execute_runs_to_done() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    let mut cmd = conn.command("INSERT INTO t VALUES (?)")?;
    cmd.bind(1, Value::Int(11))?;
    cmd.execute()?;
    assert_eq!(conn.changes(), 1);
    Ok(())
}

#[test]
fn execute_errors_on_row_producing_statement() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    // A command that produces a row is not "done" after one step.
    let mut cmd = conn.command("SELECT 1")?;
    assert_eq!(cmd.eexecute(), SQLITE_ROW);

    let mut cmd = conn.command("SELECT 2")?;
    assert!(cmd.execute().is_err());
    Ok(())
}

#[test]
fn execute_all_transfers_bindings_across_chain() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    let mut cmd = conn.command("INSERT INTO t VALUES (?);INSERT INTO t VALUES (?);")?;
    cmd.bind(1, Value::Int(5))?;
    cmd.execute_all()?;

    let mut query = conn.query("SELECT count(*), min(x), max(x) FROM t")?;
    let row = query.fetchone()?;
    assert_eq!(row.get::<i64>(0), 2);
    assert_eq!(row.get::<i64>(1), 5);
    assert_eq!(row.get::<i64>(2), 5);
    Ok(())
}

#[test]
fn execute_all_handles_mixed_chain_and_trailing_whitespace() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;

    let mut cmd = Command::new(
        &conn,
        "CREATE TABLE a (x);CREATE TABLE b (y);INSERT INTO a VALUES (1);  \n",
    )?;
    cmd.execute_all()?;

    let mut query = conn.query("SELECT x FROM a")?;
    assert_eq!(query.fetchone()?.get::<i64>(0), 1);
    conn.execute("INSERT INTO b VALUES (2)")?;
    Ok(())
}

#[test]
fn execute_all_stops_at_first_failure() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER PRIMARY KEY)")?;

    let mut cmd = conn.command(
        "INSERT INTO t VALUES (1);INSERT INTO t VALUES (1);INSERT INTO t VALUES (2);",
    )?;
    assert!(cmd.execute_all().is_err());

    // The duplicate key aborted the chain before the third insert.
    let mut query = conn.query("SELECT count(*) FROM t")?;
    assert_eq!(query.fetchone()?.get::<i64>(0), 1);
    Ok(())
}

#[test]
fn finish_is_idempotent() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    let mut cmd = conn.command("SELECT 1")?;
    cmd.finish()?;
    cmd.finish()?;
    assert_eq!(cmd.efinish(), SQLITE_OK);
    assert!(!cmd.is_prepared());
    Ok(())
}

#[test]
fn reset_keeps_bound_values() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    let mut cmd = conn.command("INSERT INTO t VALUES (?)")?;
    cmd.bind(1, Value::Int(9))?;
    cmd.execute()?;
    cmd.reset()?;
    cmd.execute()?;

    let mut query = conn.query("SELECT count(*) FROM t WHERE x = 9")?;
    assert_eq!(query.fetchone()?.get::<i64>(0), 2);
    Ok(())
}

#[test]
fn bind_by_name_resolves_index() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER, y TEXT)")?;

    let mut cmd = conn.command("INSERT INTO t VALUES (:num, :label)")?;
    cmd.bind_name(":num", Value::Int(3))?;
    cmd.bind_name(":label", Value::Text("three"))?;
    cmd.execute()?;

    let mut query = conn.query("SELECT y FROM t WHERE x = 3")?;
    assert_eq!(query.fetchone()?.get::<String>(0), "three");
    Ok(())
}

#[test]
fn reprepare_replaces_compiled_form() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Connection::open(":memory:")?;
    conn.execute("CREATE TABLE t (x INTEGER)")?;

    let mut cmd = conn.command("INSERT INTO t VALUES (1)")?;
    cmd.execute()?;
    cmd.prepare("INSERT INTO t VALUES (2)")?;
    cmd.execute()?;

    let mut query = conn.query("SELECT count(*) FROM t")?;
    assert_eq!(query.fetchone()?.get::<i64>(0), 2);
    Ok(())
}
