use std::ffi::{CStr, c_int};
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};

use libsqlite3_sys::{
    SQLITE_DONE, SQLITE_ROW, sqlite3_column_bytes, sqlite3_column_count, sqlite3_column_decltype,
    sqlite3_column_name, sqlite3_column_type, sqlite3_data_count, sqlite3_stmt,
};

use crate::connection::Connection;
use crate::error::{DatabaseError, Result};
use crate::statement::Statement;
use crate::value::{ColumnType, FromColumn};

/// A statement intended for row-producing execution.
///
/// Dereferences to [`Statement`] for binding. Rows are consumed either one
/// at a time with [`fetchone`](Self::fetchone) or through the single-pass
/// cursor returned by [`rows`](Self::rows):
///
/// ```no_run
/// use sqlite_thin::Connection;
///
/// # fn demo() -> Result<(), sqlite_thin::DatabaseError> {
/// let conn = Connection::open(":memory:")?;
/// let mut query = conn.query("SELECT name, age FROM users")?;
/// let mut rows = query.rows()?;
/// while let Some(row) = rows.next()? {
///     let name: String = row.get(0);
///     let age: i64 = row.get(1);
///     println!("{name} is {age}");
/// }
/// # Ok(())
/// # }
/// ```
pub struct Query<'conn> {
    stmt: Statement<'conn>,
    /// Set once the cursor reports done; masks the engine's auto-reset so a
    /// finished query stays finished until reset or re-prepare.
    exhausted: bool,
}

impl<'conn> Query<'conn> {
    /// Compile `sql` on `conn`.
    ///
    /// # Errors
    /// Returns `DatabaseError` if compilation fails.
    pub fn new(conn: &'conn Connection, sql: &str) -> Result<Self> {
        Ok(Self {
            stmt: Statement::new(conn, sql)?,
            exhausted: false,
        })
    }

    /// Number of columns the compiled statement produces. Valid before
    /// stepping, per engine semantics.
    #[must_use]
    pub fn column_count(&self) -> i32 {
        unsafe { sqlite3_column_count(self.stmt.handle()) }
    }

    /// Name of column `idx` (0-based), if the engine reports one.
    #[must_use]
    pub fn column_name(&self, idx: i32) -> Option<&str> {
        unsafe {
            let ptr = sqlite3_column_name(self.stmt.handle(), idx);
            if ptr.is_null() {
                None
            } else {
                CStr::from_ptr(ptr).to_str().ok()
            }
        }
    }

    /// Declared type of column `idx` from the table definition, if any.
    /// Expressions and subqueries have no declared type.
    #[must_use]
    pub fn column_decltype(&self, idx: i32) -> Option<&str> {
        unsafe {
            let ptr = sqlite3_column_decltype(self.stmt.handle(), idx);
            if ptr.is_null() {
                None
            } else {
                CStr::from_ptr(ptr).to_str().ok()
            }
        }
    }

    /// Step once and return a view over the produced row.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the step produced anything other than a
    /// row — including an empty result set — or if the query is already
    /// exhausted.
    pub fn fetchone(&mut self) -> Result<Row<'_>> {
        if self.exhausted {
            return Err(DatabaseError::new("query is exhausted"));
        }
        let rc = self.stmt.step();
        if rc != SQLITE_ROW {
            if rc == SQLITE_DONE {
                self.exhausted = true;
            }
            return Err(DatabaseError::new(self.stmt.connection().error_message()));
        }
        Ok(Row::new(self.stmt.handle()))
    }

    /// Begin iterating: steps once immediately, so the returned cursor
    /// already reflects the first row or immediate exhaustion.
    ///
    /// The cursor is forward-only and single-pass. Once it reports done,
    /// later calls to `rows` yield an already-exhausted cursor until
    /// [`reset`](Self::reset) or [`prepare`](Self::prepare).
    ///
    /// # Errors
    /// Returns `DatabaseError` if the initial step reports neither a row
    /// nor done.
    pub fn rows<'q>(&'q mut self) -> Result<Rows<'q, 'conn>> {
        if self.exhausted {
            return Ok(Rows {
                query: self,
                rc: SQLITE_DONE,
                fresh: true,
            });
        }
        let rc = self.stmt.step();
        match rc {
            SQLITE_ROW => {}
            SQLITE_DONE => self.exhausted = true,
            _ => return Err(DatabaseError::new(self.stmt.connection().error_message())),
        }
        Ok(Rows {
            query: self,
            rc,
            fresh: true,
        })
    }

    /// Rewind the execution position, clearing exhaustion; bound values are
    /// kept.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the engine reports a reset failure.
    pub fn reset(&mut self) -> Result<()> {
        self.exhausted = false;
        self.stmt.reset()
    }

    /// Re-compile this query from new text; see [`Statement::prepare`].
    ///
    /// # Errors
    /// Returns `DatabaseError` if finalize or compilation fails.
    pub fn prepare(&mut self, sql: &str) -> Result<()> {
        self.exhausted = false;
        self.stmt.prepare(sql)
    }
}

impl<'conn> Deref for Query<'conn> {
    type Target = Statement<'conn>;

    fn deref(&self) -> &Self::Target {
        &self.stmt
    }
}

impl DerefMut for Query<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.stmt
    }
}

impl std::fmt::Debug for Query<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

/// Single-pass cursor over a [`Query`]'s rows.
///
/// Holds the query mutably borrowed for its whole lifetime, so nothing else
/// can step or reset the statement while rows are being read. This is a
/// lending iterator — each [`Row`] borrows the live cursor position — so it
/// does not implement `std::iter::Iterator`; exhaustion is signalled by
/// `Ok(None)`.
pub struct Rows<'q, 'conn> {
    query: &'q mut Query<'conn>,
    rc: c_int,
    /// True until the row produced by construction has been handed out.
    fresh: bool,
}

impl Rows<'_, '_> {
    /// The next row, or `None` once the result set is exhausted.
    ///
    /// # Errors
    /// Returns `DatabaseError` if advancing reports neither a row nor done.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Row<'_>>> {
        if self.fresh {
            self.fresh = false;
        } else if self.rc == SQLITE_ROW {
            self.rc = self.query.stmt.step();
            match self.rc {
                SQLITE_ROW => {}
                SQLITE_DONE => self.query.exhausted = true,
                _ => {
                    return Err(DatabaseError::new(
                        self.query.stmt.connection().error_message(),
                    ));
                }
            }
        }
        if self.rc == SQLITE_ROW {
            Ok(Some(Row::new(self.query.stmt.handle())))
        } else {
            Ok(None)
        }
    }
}

impl std::fmt::Debug for Rows<'_, '_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows").field("rc", &self.rc).finish_non_exhaustive()
    }
}

/// A transient view into the statement's current cursor position.
///
/// A row owns nothing: column values are read lazily from the live cursor
/// through [`get`](Self::get). The borrow it holds on the cursor prevents
/// stepping, resetting, or finalizing the statement while the view exists,
/// which is what makes reading it always valid.
pub struct Row<'stmt> {
    stmt: *mut sqlite3_stmt,
    _cursor: PhantomData<&'stmt sqlite3_stmt>,
}

impl Row<'_> {
    pub(crate) fn new(stmt: *mut sqlite3_stmt) -> Self {
        Self {
            stmt,
            _cursor: PhantomData,
        }
    }

    /// Number of columns with data in the current row.
    #[must_use]
    pub fn data_count(&self) -> i32 {
        unsafe { sqlite3_data_count(self.stmt) }
    }

    /// Number of columns in the result set; equals the owning query's
    /// [`column_count`](Query::column_count).
    #[must_use]
    pub fn column_count(&self) -> i32 {
        unsafe { sqlite3_column_count(self.stmt) }
    }

    /// Storage class of column `idx` (0-based) in this row.
    #[must_use]
    pub fn column_type(&self, idx: i32) -> ColumnType {
        ColumnType::from_code(unsafe { sqlite3_column_type(self.stmt, idx) })
    }

    /// Size in bytes of column `idx` read as text or blob.
    #[must_use]
    pub fn column_bytes(&self, idx: i32) -> i32 {
        unsafe { sqlite3_column_bytes(self.stmt, idx) }
    }

    /// Read column `idx` (0-based) as `T`; see [`FromColumn`] for the
    /// coercion contract. Use `Option<T>` to distinguish SQL NULL.
    #[must_use]
    pub fn get<T: FromColumn>(&self, idx: i32) -> T {
        T::from_column(self, idx)
    }

    pub(crate) fn handle(&self) -> *mut sqlite3_stmt {
        self.stmt
    }
}

impl std::fmt::Debug for Row<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("data_count", &self.data_count())
            .finish_non_exhaustive()
    }
}
