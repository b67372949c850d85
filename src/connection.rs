use std::ffi::{CStr, CString, c_int, c_void};
use std::ptr;

use libsqlite3_sys::{
    SQLITE_MISUSE, SQLITE_OK, sqlite3, sqlite3_busy_handler, sqlite3_busy_timeout,
    sqlite3_changes, sqlite3_close, sqlite3_commit_hook, sqlite3_errcode, sqlite3_errmsg,
    sqlite3_exec, sqlite3_free, sqlite3_last_insert_rowid, sqlite3_mprintf, sqlite3_open,
    sqlite3_open_v2, sqlite3_rollback_hook, sqlite3_set_authorizer, sqlite3_update_hook,
};

use crate::command::Command;
use crate::error::{DatabaseError, Result};
use crate::hooks::{
    self, AuthorizeHandler, BusyHandler, CommitHandler, RollbackHandler, UpdateHandler,
};
use crate::query::Query;
use crate::transaction::Transaction;
use crate::value::Value;

/// A database connection owning one engine handle.
///
/// The handle is closed on drop. Raw (`e`-prefixed) operations return the
/// engine's status code untranslated; their throwing counterparts raise
/// [`DatabaseError`] built from the connection's last-error text.
///
/// Each hook slot stores at most one closure; setting a hook replaces the
/// prior closure and re-registers the engine-level trampoline in the same
/// call, so a stale closure can never be invoked. The stored closure lives
/// behind a stable heap cell whose address is the context pointer handed to
/// the engine. Stored hooks carry across [`connect`](Self::connect): a hook
/// set before a handle exists becomes live on the next successful open.
///
/// A `Connection` performs no internal locking and is neither `Send` nor
/// `Sync`; the engine's own threading mode governs concurrent access.
pub struct Connection {
    db: *mut sqlite3,
    busy_handler: Option<Box<BusyHandler>>,
    commit_handler: Option<Box<CommitHandler>>,
    rollback_handler: Option<Box<RollbackHandler>>,
    update_handler: Option<Box<UpdateHandler>>,
    authorize_handler: Option<Box<AuthorizeHandler>>,
}

impl Connection {
    /// Create a connection with no handle; call [`connect`](Self::connect)
    /// to open one.
    #[must_use]
    pub fn new() -> Self {
        Self {
            db: ptr::null_mut(),
            busy_handler: None,
            commit_handler: None,
            rollback_handler: None,
            update_handler: None,
            authorize_handler: None,
        }
    }

    /// Open a connection to `name` (a filename, `:memory:`, or a URI).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the engine cannot open the target.
    pub fn open(name: &str) -> Result<Self> {
        let mut conn = Self::new();
        let rc = conn.connect(name);
        if rc != SQLITE_OK {
            return Err(DatabaseError::new("can't connect database"));
        }
        Ok(conn)
    }

    /// Open a new handle for `name`, closing any existing handle first.
    /// Returns the engine's status code.
    pub fn connect(&mut self, name: &str) -> c_int {
        self.disconnect();

        let Ok(c_name) = CString::new(name) else {
            return SQLITE_MISUSE;
        };
        let rc = unsafe { sqlite3_open(c_name.as_ptr(), &raw mut self.db) };
        if rc == SQLITE_OK {
            self.reinstall_hooks();
        }
        rc
    }

    /// Like [`connect`](Self::connect) but with explicit open flags and an
    /// optional VFS name. Flags are the engine's `SQLITE_OPEN_*` constants,
    /// re-exported through [`crate::ffi`].
    pub fn connect_with_flags(&mut self, name: &str, flags: c_int, vfs: Option<&str>) -> c_int {
        self.disconnect();

        let Ok(c_name) = CString::new(name) else {
            return SQLITE_MISUSE;
        };
        let c_vfs = match vfs {
            Some(v) => match CString::new(v) {
                Ok(v) => Some(v),
                Err(_) => return SQLITE_MISUSE,
            },
            None => None,
        };
        let vfs_ptr = c_vfs.as_ref().map_or(ptr::null(), |v| v.as_ptr());
        let rc = unsafe { sqlite3_open_v2(c_name.as_ptr(), &raw mut self.db, flags, vfs_ptr) };
        if rc == SQLITE_OK {
            self.reinstall_hooks();
        }
        rc
    }

    /// Close the handle if open. Idempotent: closing an already-closed
    /// connection is a no-op success.
    pub fn disconnect(&mut self) -> c_int {
        let mut rc = SQLITE_OK;
        if !self.db.is_null() {
            rc = unsafe { sqlite3_close(self.db) };
            self.db = ptr::null_mut();
        }
        rc
    }

    /// Throwing variant of [`disconnect`](Self::disconnect).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the engine reports a non-OK status, e.g.
    /// when prepared statements are still unfinalized.
    pub fn close(&mut self) -> Result<()> {
        if self.db.is_null() {
            return Ok(());
        }
        let rc = unsafe { sqlite3_close(self.db) };
        if rc != SQLITE_OK {
            // Handle stays open so the caller can still finalize statements.
            return Err(DatabaseError::new(self.error_message()));
        }
        self.db = ptr::null_mut();
        Ok(())
    }

    /// Run one or more semicolon-separated statements with no result rows
    /// expected.
    ///
    /// # Errors
    /// Returns `DatabaseError` with the engine's diagnostic on any non-OK
    /// status.
    pub fn execute(&self, sql: &str) -> Result<()> {
        let rc = self.eexecute(sql);
        if rc != SQLITE_OK {
            return Err(DatabaseError::new(self.error_message()));
        }
        Ok(())
    }

    /// Raw variant of [`execute`](Self::execute); returns the engine's
    /// status code.
    pub fn eexecute(&self, sql: &str) -> c_int {
        let Ok(c_sql) = CString::new(sql) else {
            return SQLITE_MISUSE;
        };
        unsafe {
            sqlite3_exec(self.db, c_sql.as_ptr(), None, ptr::null_mut(), ptr::null_mut())
        }
    }

    /// Render `template` with the engine's safe-quoting formatter, then
    /// execute the result. Each `%`-directive consumes one argument:
    /// `%q`/`%Q`/`%w`/`%s` take text, `%d`/`%i` integers, `%f` doubles, and
    /// `%%` emits a literal percent. The rendered buffer is always released,
    /// even on failure.
    ///
    /// Returns the engine's status code; a malformed template or a
    /// directive/argument mismatch yields `SQLITE_MISUSE`.
    pub fn executef(&self, template: &str, args: &[Value<'_>]) -> c_int {
        match format_sql(template, args) {
            Some(sql) => self.eexecute(&sql),
            None => SQLITE_MISUSE,
        }
    }

    /// `ATTACH` the database file `dbname` under the schema alias `alias`.
    /// Returns the engine's status code.
    pub fn attach(&self, dbname: &str, alias: &str) -> c_int {
        self.executef("ATTACH '%q' AS '%q'", &[Value::Text(dbname), Value::Text(alias)])
    }

    /// `DETACH` the schema alias `alias`. Returns the engine's status code.
    pub fn detach(&self, alias: &str) -> c_int {
        self.executef("DETACH '%q'", &[Value::Text(alias)])
    }

    /// Set the engine-level busy timeout in milliseconds. Returns the
    /// engine's status code; `SQLITE_MISUSE` when no handle is open.
    pub fn set_busy_timeout(&self, ms: i32) -> c_int {
        if self.db.is_null() {
            return SQLITE_MISUSE;
        }
        unsafe { sqlite3_busy_timeout(self.db, ms) }
    }

    /// Rowid of the most recent successful INSERT on this connection;
    /// 0 when no handle is open.
    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        if self.db.is_null() {
            return 0;
        }
        unsafe { sqlite3_last_insert_rowid(self.db) }
    }

    /// Number of rows changed by the most recently completed statement;
    /// 0 when no handle is open.
    #[must_use]
    pub fn changes(&self) -> i32 {
        if self.db.is_null() {
            return 0;
        }
        unsafe { sqlite3_changes(self.db) }
    }

    /// The engine's current error code for this connection; `SQLITE_MISUSE`
    /// when no handle is open.
    #[must_use]
    pub fn error_code(&self) -> c_int {
        if self.db.is_null() {
            return SQLITE_MISUSE;
        }
        unsafe { sqlite3_errcode(self.db) }
    }

    /// The engine's current error message for this connection.
    #[must_use]
    pub fn error_message(&self) -> String {
        if self.db.is_null() {
            return String::from("not connected");
        }
        unsafe {
            let ptr = sqlite3_errmsg(self.db);
            if ptr.is_null() {
                String::new()
            } else {
                CStr::from_ptr(ptr).to_string_lossy().into_owned()
            }
        }
    }

    /// Prepare `sql` as a non-row-producing [`Command`].
    ///
    /// # Errors
    /// Returns `DatabaseError` if compilation fails.
    pub fn command<'conn>(&'conn self, sql: &str) -> Result<Command<'conn>> {
        Command::new(self, sql)
    }

    /// Prepare `sql` as a row-producing [`Query`].
    ///
    /// # Errors
    /// Returns `DatabaseError` if compilation fails.
    pub fn query<'conn>(&'conn self, sql: &str) -> Result<Query<'conn>> {
        Query::new(self, sql)
    }

    /// Begin a [`Transaction`] scope on this connection.
    #[must_use]
    pub fn transaction(&self, commit_on_drop: bool, reserve: bool) -> Transaction<'_> {
        Transaction::new(self, commit_on_drop, reserve)
    }

    /// Store `handler` as the busy handler (replacing any prior one; `None`
    /// clears the slot) and re-register the trampoline with the engine.
    pub fn set_busy_handler(&mut self, handler: Option<BusyHandler>) {
        self.busy_handler = handler.map(Box::new);
        if self.db.is_null() {
            return;
        }
        unsafe {
            match self.busy_handler.as_mut() {
                Some(cell) => {
                    let ctx = ptr::from_mut::<BusyHandler>(&mut **cell).cast::<c_void>();
                    sqlite3_busy_handler(self.db, Some(hooks::busy_handler_tramp), ctx);
                }
                None => {
                    sqlite3_busy_handler(self.db, None, ptr::null_mut());
                }
            }
        }
    }

    /// Store `handler` as the commit hook; see [`CommitHandler`] for the
    /// veto contract. `None` clears the slot.
    pub fn set_commit_handler(&mut self, handler: Option<CommitHandler>) {
        self.commit_handler = handler.map(Box::new);
        if self.db.is_null() {
            return;
        }
        unsafe {
            match self.commit_handler.as_mut() {
                Some(cell) => {
                    let ctx = ptr::from_mut::<CommitHandler>(&mut **cell).cast::<c_void>();
                    sqlite3_commit_hook(self.db, Some(hooks::commit_hook_tramp), ctx);
                }
                None => {
                    sqlite3_commit_hook(self.db, None, ptr::null_mut());
                }
            }
        }
    }

    /// Store `handler` as the rollback hook. `None` clears the slot.
    pub fn set_rollback_handler(&mut self, handler: Option<RollbackHandler>) {
        self.rollback_handler = handler.map(Box::new);
        if self.db.is_null() {
            return;
        }
        unsafe {
            match self.rollback_handler.as_mut() {
                Some(cell) => {
                    let ctx = ptr::from_mut::<RollbackHandler>(&mut **cell).cast::<c_void>();
                    sqlite3_rollback_hook(self.db, Some(hooks::rollback_hook_tramp), ctx);
                }
                None => {
                    sqlite3_rollback_hook(self.db, None, ptr::null_mut());
                }
            }
        }
    }

    /// Store `handler` as the update hook, invoked after every row change.
    /// `None` clears the slot.
    pub fn set_update_handler(&mut self, handler: Option<UpdateHandler>) {
        self.update_handler = handler.map(Box::new);
        if self.db.is_null() {
            return;
        }
        unsafe {
            match self.update_handler.as_mut() {
                Some(cell) => {
                    let ctx = ptr::from_mut::<UpdateHandler>(&mut **cell).cast::<c_void>();
                    sqlite3_update_hook(self.db, Some(hooks::update_hook_tramp), ctx);
                }
                None => {
                    sqlite3_update_hook(self.db, None, ptr::null_mut());
                }
            }
        }
    }

    /// Store `handler` as the authorizer consulted during SQL compilation.
    /// `None` clears the slot.
    pub fn set_authorize_handler(&mut self, handler: Option<AuthorizeHandler>) {
        self.authorize_handler = handler.map(Box::new);
        if self.db.is_null() {
            return;
        }
        unsafe {
            match self.authorize_handler.as_mut() {
                Some(cell) => {
                    let ctx = ptr::from_mut::<AuthorizeHandler>(&mut **cell).cast::<c_void>();
                    sqlite3_set_authorizer(self.db, Some(hooks::authorizer_tramp), ctx);
                }
                None => {
                    sqlite3_set_authorizer(self.db, None, ptr::null_mut());
                }
            }
        }
    }

    pub(crate) fn handle(&self) -> *mut sqlite3 {
        self.db
    }

    /// Register every stored closure with the current handle. A hook set
    /// while no handle was open becomes live here, and a fresh handle from
    /// a reconnect gets the hooks of the old one back.
    fn reinstall_hooks(&mut self) {
        unsafe {
            if let Some(cell) = self.busy_handler.as_mut() {
                let ctx = ptr::from_mut::<BusyHandler>(&mut **cell).cast::<c_void>();
                sqlite3_busy_handler(self.db, Some(hooks::busy_handler_tramp), ctx);
            }
            if let Some(cell) = self.commit_handler.as_mut() {
                let ctx = ptr::from_mut::<CommitHandler>(&mut **cell).cast::<c_void>();
                sqlite3_commit_hook(self.db, Some(hooks::commit_hook_tramp), ctx);
            }
            if let Some(cell) = self.rollback_handler.as_mut() {
                let ctx = ptr::from_mut::<RollbackHandler>(&mut **cell).cast::<c_void>();
                sqlite3_rollback_hook(self.db, Some(hooks::rollback_hook_tramp), ctx);
            }
            if let Some(cell) = self.update_handler.as_mut() {
                let ctx = ptr::from_mut::<UpdateHandler>(&mut **cell).cast::<c_void>();
                sqlite3_update_hook(self.db, Some(hooks::update_hook_tramp), ctx);
            }
            if let Some(cell) = self.authorize_handler.as_mut() {
                let ctx = ptr::from_mut::<AuthorizeHandler>(&mut **cell).cast::<c_void>();
                sqlite3_set_authorizer(self.db, Some(hooks::authorizer_tramp), ctx);
            }
        }
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let rc = self.disconnect();
        if rc != SQLITE_OK {
            tracing::error!(rc, "closing connection failed during drop");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("open", &!self.db.is_null())
            .finish_non_exhaustive()
    }
}

/// Render one `%`-directive through the engine's formatter so `%q`/`%Q`/`%w`
/// get its quoting rules. The engine-allocated buffer is copied out and
/// freed before returning.
fn mprintf_directive(directive: char, arg: &Value<'_>) -> Option<String> {
    let fmt: &CStr = match (directive, arg) {
        ('q', Value::Text(_)) => c"%q",
        ('Q', Value::Text(_)) => c"%Q",
        ('w', Value::Text(_)) => c"%w",
        ('s', Value::Text(_)) => c"%s",
        ('d' | 'i', Value::Int(_) | Value::Int64(_)) => c"%lld",
        ('f', Value::Double(_)) => c"%f",
        _ => return None,
    };
    unsafe {
        let rendered = match arg {
            Value::Text(text) => {
                let c_text = CString::new(*text).ok()?;
                sqlite3_mprintf(fmt.as_ptr(), c_text.as_ptr())
            }
            Value::Int(v) => sqlite3_mprintf(fmt.as_ptr(), i64::from(*v)),
            Value::Int64(v) => sqlite3_mprintf(fmt.as_ptr(), *v),
            Value::Double(v) => sqlite3_mprintf(fmt.as_ptr(), *v),
            _ => return None,
        };
        if rendered.is_null() {
            return None;
        }
        let out = CStr::from_ptr(rendered).to_string_lossy().into_owned();
        sqlite3_free(rendered.cast::<c_void>());
        Some(out)
    }
}

fn format_sql(template: &str, args: &[Value<'_>]) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 16 * args.len());
    let mut args = args.iter();
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let directive = chars.next()?;
        if directive == '%' {
            out.push('%');
            continue;
        }
        let arg = args.next()?;
        out.push_str(&mprintf_directive(directive, arg)?);
    }
    // Leftover arguments are a caller mistake.
    if args.next().is_some() {
        return None;
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sql_quotes_embedded_quote() {
        let sql = format_sql("INSERT INTO t VALUES ('%q')", &[Value::Text("O'Brien")]).unwrap();
        assert_eq!(sql, "INSERT INTO t VALUES ('O''Brien')");
    }

    #[test]
    fn format_sql_literal_percent_and_int() {
        let sql = format_sql("SELECT %d AS \"100%%\"", &[Value::Int(42)]).unwrap();
        assert_eq!(sql, "SELECT 42 AS \"100%\"");
    }

    #[test]
    fn format_sql_rejects_arity_mismatch() {
        assert!(format_sql("%q %q", &[Value::Text("a")]).is_none());
        assert!(format_sql("%q", &[Value::Text("a"), Value::Text("b")]).is_none());
    }

    #[test]
    fn format_sql_rejects_type_mismatch() {
        assert!(format_sql("%d", &[Value::Text("a")]).is_none());
    }
}
