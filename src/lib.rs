//! Thin resource-safe wrapper over the `SQLite` C API.
//!
//! This crate wraps `libsqlite3-sys` with handles that release their engine
//! resources when dropped: [`Connection`], [`Statement`] (through its two
//! faces [`Command`] and [`Query`]), the single-pass row cursor [`Rows`]
//! with its [`Row`] views, and the RAII [`Transaction`] scope. Engine-level
//! hooks (busy handler, commit/rollback/update notifications, authorizer)
//! are exposed as plain Rust closures bridged through the [`hooks`]
//! trampolines.
//!
//! Every fallible operation comes in two flavors, following the engine's
//! own conventions: a throwing variant returning [`Result`] with a
//! [`DatabaseError`] built from the connection's last-error text, and a raw
//! `e`-prefixed variant returning the engine's `c_int` status untranslated
//! for callers who want to branch on codes. The raw codes and the rest of
//! the C surface are re-exported under [`ffi`].
//!
//! Open a connection, run DDL, and stream a query:
//!
//! ```no_run
//! use sqlite_thin::{Connection, Value};
//!
//! # fn demo() -> Result<(), sqlite_thin::DatabaseError> {
//! let conn = Connection::open(":memory:")?;
//! conn.execute("CREATE TABLE users (name TEXT, age INTEGER)")?;
//!
//! let mut cmd = conn.command("INSERT INTO users VALUES (?, ?)")?;
//! cmd.bind(1, Value::Text("Alice"))?;
//! cmd.bind(2, Value::Int(42))?;
//! cmd.execute()?;
//!
//! let mut query = conn.query("SELECT name, age FROM users")?;
//! let mut rows = query.rows()?;
//! while let Some(row) = rows.next()? {
//!     println!("{} is {}", row.get::<String>(0), row.get::<i64>(1));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! This layer adds no locking of its own: a [`Connection`] and everything
//! borrowed from it stay on one thread, and the engine's threading mode
//! governs anything beyond that.

mod command;
mod connection;
mod error;
pub mod hooks;
mod query;
mod statement;
mod transaction;
mod value;

pub use command::Command;
pub use connection::Connection;
pub use error::{DatabaseError, Result};
pub use hooks::{
    Action, Authorization, AuthorizeHandler, BusyHandler, CommitHandler, RollbackHandler,
    UpdateHandler,
};
pub use query::{Query, Row, Rows};
pub use statement::Statement;
pub use transaction::Transaction;
pub use value::{ColumnType, FromColumn, Value};

/// The underlying engine binding, re-exported for status codes
/// (`SQLITE_OK`, `SQLITE_ROW`, `SQLITE_DONE`, …), open flags
/// (`SQLITE_OPEN_*`), and authorizer action codes.
pub use libsqlite3_sys as ffi;
