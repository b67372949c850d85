use std::ffi::{CStr, CString, c_char, c_int};
use std::ptr;

use libsqlite3_sys::{
    SQLITE_MISUSE, SQLITE_OK, SQLITE_STATIC, SQLITE_TRANSIENT, sqlite3_bind_blob,
    sqlite3_bind_double, sqlite3_bind_int64, sqlite3_bind_null, sqlite3_bind_parameter_count,
    sqlite3_bind_parameter_index, sqlite3_bind_text, sqlite3_errstr, sqlite3_finalize,
    sqlite3_prepare_v2, sqlite3_reset, sqlite3_step, sqlite3_stmt,
};

use crate::connection::Connection;
use crate::error::{DatabaseError, Result};
use crate::value::{StoredValue, Value};

/// A compiled statement scoped to one [`Connection`].
///
/// The compiled handle is either null (unprepared or finished) or valid and
/// associated with the borrowed connection; binding and stepping require a
/// non-null handle. The original SQL text is retained for diagnostics and as
/// the source of the unconsumed tail that drives multi-statement execution.
///
/// Dropping a statement finalizes the compiled form; a finalize failure
/// during drop is reported through `tracing` rather than panicking.
///
/// `Statement` is the shared base of [`Command`](crate::Command) and
/// [`Query`](crate::Query); it is not constructed directly.
pub struct Statement<'conn> {
    conn: &'conn Connection,
    stmt: *mut sqlite3_stmt,
    sql: CString,
    /// Byte offset into `sql` of the text the last compile did not consume.
    tail: usize,
    /// Values recorded at bind time so chain execution can re-apply them to
    /// each successive compiled form.
    bindings: Vec<(i32, StoredValue)>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn unprepared(conn: &'conn Connection) -> Self {
        Self {
            conn,
            stmt: ptr::null_mut(),
            sql: CString::default(),
            tail: 0,
            bindings: Vec::new(),
        }
    }

    pub(crate) fn new(conn: &'conn Connection, sql: &str) -> Result<Self> {
        let mut stmt = Self::unprepared(conn);
        stmt.prepare(sql)?;
        Ok(stmt)
    }

    /// Compile `sql`, finalizing any previously compiled form first.
    ///
    /// # Errors
    /// Returns `DatabaseError` if finalizing the prior form or compiling the
    /// new text fails.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        let rc = self.eprepare(sql);
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.conn.error_message()));
        }
        Ok(())
    }

    /// Raw variant of [`prepare`](Self::prepare); returns the engine's
    /// status code. A finalize failure on the prior compiled form is
    /// returned before any new text is compiled.
    pub fn eprepare(&mut self, sql: &str) -> c_int {
        let rc = self.efinish();
        if rc != SQLITE_OK {
            return rc;
        }
        let Ok(c_sql) = CString::new(sql) else {
            return SQLITE_MISUSE;
        };
        self.sql = c_sql;
        self.bindings.clear();
        self.compile_from(0)
    }

    /// Finalize the compiled form if one exists.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the engine reports a finalize failure.
    pub fn finish(&mut self) -> Result<()> {
        let rc = self.efinish();
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.conn.error_message()));
        }
        Ok(())
    }

    /// Raw variant of [`finish`](Self::finish). Safe to call when already
    /// finished; a second call is a no-op success.
    pub fn efinish(&mut self) -> c_int {
        let mut rc = SQLITE_OK;
        if !self.stmt.is_null() {
            rc = unsafe { sqlite3_finalize(self.stmt) };
            self.stmt = ptr::null_mut();
        }
        self.tail = self.sql.as_bytes().len();
        rc
    }

    /// Whether a compiled form currently exists.
    #[must_use]
    pub fn is_prepared(&self) -> bool {
        !self.stmt.is_null()
    }

    /// Bind `value` to the parameter at 1-based `idx`.
    ///
    /// Integer values are widened into signed 64-bit on the wire. See
    /// [`Value`] for the text/blob retention modes.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the engine rejects the bind (e.g. index
    /// out of range) or no compiled form exists.
    pub fn bind(&mut self, idx: i32, value: Value<'_>) -> Result<()> {
        if self.stmt.is_null() {
            return Err(DatabaseError::new("bind on an unprepared statement"));
        }
        let rc = bind_value(self.stmt, idx, &value);
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.conn.error_message()));
        }
        self.record_binding(idx, &value);
        Ok(())
    }

    /// Bind `value` to the named parameter `name` (including its `:`/`@`/`?`
    /// prefix), resolving the name to its 1-based index first.
    ///
    /// # Panics
    /// Panics if `name` does not occur in the compiled statement. An unknown
    /// name is a misuse precondition, caller responsibility by contract, not
    /// a recoverable error.
    ///
    /// # Errors
    /// Returns `DatabaseError` under the same conditions as
    /// [`bind`](Self::bind).
    pub fn bind_name(&mut self, name: &str, value: Value<'_>) -> Result<()> {
        let idx = self.parameter_index(name);
        assert!(idx != 0, "unknown parameter name: {name}");
        self.bind(idx, value)
    }

    /// Resolve a parameter name to its 1-based index; 0 when unknown.
    #[must_use]
    pub fn parameter_index(&self, name: &str) -> i32 {
        let Ok(c_name) = CString::new(name) else {
            return 0;
        };
        unsafe { sqlite3_bind_parameter_index(self.stmt, c_name.as_ptr()) }
    }

    /// Advance the cursor one step and return the engine's raw status
    /// (`SQLITE_ROW`, `SQLITE_DONE`, or an error code) untranslated.
    pub fn step(&mut self) -> c_int {
        if self.stmt.is_null() {
            return SQLITE_MISUSE;
        }
        unsafe { sqlite3_step(self.stmt) }
    }

    /// Rewind the execution position so the statement can run again. Bound
    /// values are kept.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the engine reports a reset failure.
    pub fn reset(&mut self) -> Result<()> {
        let rc = unsafe { sqlite3_reset(self.stmt) };
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.conn.error_message()));
        }
        Ok(())
    }

    /// The connection this statement is scoped to.
    #[must_use]
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    pub(crate) fn handle(&self) -> *mut sqlite3_stmt {
        self.stmt
    }

    /// Whether unconsumed statement text remains after the compiled form's
    /// extent.
    pub(crate) fn has_remaining(&self) -> bool {
        !self.remaining().trim().is_empty()
    }

    fn remaining(&self) -> &str {
        std::str::from_utf8(&self.sql.as_bytes()[self.tail..]).unwrap_or("")
    }

    /// Finalize the current compiled form and compile the unconsumed
    /// remainder as the next statement in the chain, re-applying recorded
    /// bindings to it. After a successful return the handle may still be
    /// null if the remainder held no statement (whitespace or comments).
    pub(crate) fn ecompile_remainder(&mut self) -> c_int {
        let offset = self.tail;
        if !self.stmt.is_null() {
            let rc = unsafe { sqlite3_finalize(self.stmt) };
            self.stmt = ptr::null_mut();
            if rc != SQLITE_OK {
                return rc;
            }
        }
        let rc = self.compile_from(offset);
        if rc != SQLITE_OK || self.stmt.is_null() {
            return rc;
        }
        self.rebind_recorded()
    }

    fn compile_from(&mut self, offset: usize) -> c_int {
        let base = self.sql.as_ptr();
        let len = self.sql.as_bytes().len();
        let mut tail_ptr: *const c_char = ptr::null();
        let rc = unsafe {
            sqlite3_prepare_v2(
                self.conn.handle(),
                base.add(offset),
                -1,
                &raw mut self.stmt,
                &raw mut tail_ptr,
            )
        };
        self.tail = if rc == SQLITE_OK && !tail_ptr.is_null() {
            // The engine hands back a pointer into our own buffer.
            unsafe { tail_ptr.offset_from(base) as usize }
        } else {
            len
        };
        rc
    }

    /// Re-apply recorded bindings to a freshly compiled form, skipping
    /// indices beyond its parameter count.
    fn rebind_recorded(&mut self) -> c_int {
        let count = unsafe { sqlite3_bind_parameter_count(self.stmt) };
        for (idx, stored) in &self.bindings {
            if *idx > count {
                continue;
            }
            let rc = bind_value(self.stmt, *idx, &stored.as_value());
            if rc != SQLITE_OK {
                return rc;
            }
        }
        SQLITE_OK
    }

    fn record_binding(&mut self, idx: i32, value: &Value<'_>) {
        let stored = StoredValue::record(value);
        if let Some(slot) = self.bindings.iter_mut().find(|(i, _)| *i == idx) {
            slot.1 = stored;
        } else {
            self.bindings.push((idx, stored));
        }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        let rc = self.efinish();
        if rc != SQLITE_OK {
            // Cannot raise from drop; report and move on.
            let detail = unsafe { CStr::from_ptr(sqlite3_errstr(rc)) }.to_string_lossy();
            tracing::error!(
                rc,
                sql = %self.sql.to_string_lossy(),
                error = %detail,
                "finalize failed while dropping statement"
            );
        }
    }
}

impl std::fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("prepared", &self.is_prepared())
            .field("sql", &self.sql)
            .finish_non_exhaustive()
    }
}

/// One bind call dispatching on the value's tag.
fn bind_value(stmt: *mut sqlite3_stmt, idx: i32, value: &Value<'_>) -> c_int {
    unsafe {
        match value {
            Value::Int(v) => sqlite3_bind_int64(stmt, idx, i64::from(*v)),
            Value::UInt(v) => sqlite3_bind_int64(stmt, idx, i64::from(*v)),
            Value::Int64(v) => sqlite3_bind_int64(stmt, idx, *v),
            Value::UInt64(v) => sqlite3_bind_int64(stmt, idx, *v as i64),
            Value::Double(v) => sqlite3_bind_double(stmt, idx, *v),
            Value::Text(v) => sqlite3_bind_text(
                stmt,
                idx,
                v.as_ptr().cast::<c_char>(),
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::StaticText(v) => sqlite3_bind_text(
                stmt,
                idx,
                v.as_ptr().cast::<c_char>(),
                v.len() as c_int,
                SQLITE_STATIC(),
            ),
            Value::Blob(v) => sqlite3_bind_blob(
                stmt,
                idx,
                v.as_ptr().cast(),
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::StaticBlob(v) => sqlite3_bind_blob(
                stmt,
                idx,
                v.as_ptr().cast(),
                v.len() as c_int,
                SQLITE_STATIC(),
            ),
            Value::Null => sqlite3_bind_null(stmt, idx),
        }
    }
}
