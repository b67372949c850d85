use std::ffi::c_int;

use libsqlite3_sys::SQLITE_OK;

use crate::connection::Connection;

/// A scope around `BEGIN` / `COMMIT` / `ROLLBACK` on one connection.
///
/// Construction issues `BEGIN` (or `BEGIN IMMEDIATE` when `reserve` is set).
/// Explicit [`commit`](Self::commit) and [`rollback`](Self::rollback) return
/// the raw terminator status and disarm the scope. If neither was called,
/// drop issues the terminator chosen by the `commit_on_drop` intent flag —
/// and if that statement itself fails, the process is aborted: a raise is
/// impossible from drop, and silently losing a transaction boundary is worse
/// than a hard stop.
///
/// A failed `BEGIN` is deliberately not surfaced at construction; the scope
/// is still considered active, and the failure shows up through the
/// terminator's status instead.
///
/// ```no_run
/// use sqlite_thin::{Connection, Transaction};
///
/// # fn demo() -> Result<(), sqlite_thin::DatabaseError> {
/// let conn = Connection::open("app.db")?;
/// let txn = conn.transaction(false, false);
/// conn.execute("INSERT INTO audit VALUES ('begin')")?;
/// let rc = txn.commit();
/// assert_eq!(rc, sqlite_thin::ffi::SQLITE_OK);
/// # Ok(())
/// # }
/// ```
pub struct Transaction<'conn> {
    conn: Option<&'conn Connection>,
    commit_on_drop: bool,
}

impl<'conn> Transaction<'conn> {
    /// Begin a transaction: `BEGIN IMMEDIATE` when `reserve` is set,
    /// plain `BEGIN` otherwise. `commit_on_drop` picks the terminator the
    /// drop path issues when neither [`commit`](Self::commit) nor
    /// [`rollback`](Self::rollback) ran.
    #[must_use]
    pub fn new(conn: &'conn Connection, commit_on_drop: bool, reserve: bool) -> Self {
        let _ = conn.eexecute(if reserve { "BEGIN IMMEDIATE" } else { "BEGIN" });
        Self {
            conn: Some(conn),
            commit_on_drop,
        }
    }

    /// Issue `COMMIT`, disarm the scope, and return the raw status. A
    /// non-success status must be handled by the caller; nothing is raised
    /// from here.
    pub fn commit(mut self) -> c_int {
        self.terminate("COMMIT")
    }

    /// Issue `ROLLBACK`, disarm the scope, and return the raw status.
    pub fn rollback(mut self) -> c_int {
        self.terminate("ROLLBACK")
    }

    fn terminate(&mut self, sql: &str) -> c_int {
        match self.conn.take() {
            Some(conn) => conn.eexecute(sql),
            None => SQLITE_OK,
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        let sql = if self.commit_on_drop { "COMMIT" } else { "ROLLBACK" };
        let rc = conn.eexecute(sql);
        if rc != SQLITE_OK {
            tracing::error!(rc, terminator = sql, "transaction terminator failed during drop");
            std::process::abort();
        }
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("active", &self.conn.is_some())
            .field("commit_on_drop", &self.commit_on_drop)
            .finish()
    }
}
