use std::ffi::c_int;
use std::ops::{Deref, DerefMut};

use libsqlite3_sys::{SQLITE_DONE, SQLITE_OK};

use crate::connection::Connection;
use crate::error::{DatabaseError, Result};
use crate::statement::Statement;

/// A statement intended for non-row-producing execution: INSERT, UPDATE,
/// DELETE, DDL.
///
/// Dereferences to [`Statement`] for preparing, binding, and resetting.
///
/// ```no_run
/// use sqlite_thin::{Connection, Value};
///
/// # fn demo() -> Result<(), sqlite_thin::DatabaseError> {
/// let conn = Connection::open(":memory:")?;
/// conn.execute("CREATE TABLE t (x INTEGER)")?;
///
/// let mut cmd = conn.command("INSERT INTO t VALUES (?)")?;
/// cmd.bind(1, Value::Int(5))?;
/// cmd.execute()?;
/// # Ok(())
/// # }
/// ```
pub struct Command<'conn> {
    stmt: Statement<'conn>,
}

impl<'conn> Command<'conn> {
    /// Compile `sql` on `conn`.
    ///
    /// # Errors
    /// Returns `DatabaseError` if compilation fails.
    pub fn new(conn: &'conn Connection, sql: &str) -> Result<Self> {
        Ok(Self {
            stmt: Statement::new(conn, sql)?,
        })
    }

    /// Execute the compiled statement to completion.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the step status is anything but done —
    /// including a result row, which a command is not expected to produce.
    pub fn execute(&mut self) -> Result<()> {
        let rc = self.eexecute();
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.stmt.connection().error_message()));
        }
        Ok(())
    }

    /// Raw variant of [`execute`](Self::execute): steps once and normalizes
    /// a done status to `SQLITE_OK`; anything else comes back untranslated.
    pub fn eexecute(&mut self) -> c_int {
        let rc = self.stmt.step();
        if rc == SQLITE_DONE { SQLITE_OK } else { rc }
    }

    /// Execute every statement in a semicolon-separated chain sharing this
    /// command's connection.
    ///
    /// Bindings recorded before the call are transferred into each
    /// successive compiled form, so a single `bind` covers every statement
    /// in the chain that has a placeholder at that index. Progress is
    /// driven purely by the unconsumed-tail offset the engine reports after
    /// each compile; the engine's own statement-completeness check is not
    /// consulted.
    ///
    /// # Errors
    /// Returns `DatabaseError` on the first compile, bind-transfer, or
    /// execution failure; statements already executed are not undone.
    pub fn execute_all(&mut self) -> Result<()> {
        let rc = self.eexecute_all();
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.stmt.connection().error_message()));
        }
        Ok(())
    }

    /// Raw variant of [`execute_all`](Self::execute_all).
    pub fn eexecute_all(&mut self) -> c_int {
        let mut rc = self.eexecute();
        if rc != SQLITE_OK {
            return rc;
        }
        while self.stmt.has_remaining() {
            rc = self.stmt.ecompile_remainder();
            if rc != SQLITE_OK {
                return rc;
            }
            // A remainder of whitespace or comments compiles to nothing.
            if !self.stmt.is_prepared() {
                break;
            }
            rc = self.eexecute();
            if rc != SQLITE_OK {
                return rc;
            }
        }
        SQLITE_OK
    }
}

impl<'conn> Deref for Command<'conn> {
    type Target = Statement<'conn>;

    fn deref(&self) -> &Self::Target {
        &self.stmt
    }
}

impl DerefMut for Command<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stmt
    }
}

impl std::fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Command").field(&self.stmt).finish()
    }
}
