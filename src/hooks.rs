//! Typed closures behind the engine's untyped C callback slots.
//!
//! Each hook kind stores a boxed closure inside the [`Connection`]
//! (behind a stable heap cell, so the context pointer handed to the engine
//! stays valid until the closure is replaced) and registers the matching
//! trampoline here. A trampoline recovers the closure from the opaque
//! context pointer, invokes it, and translates the return value into the
//! sentinel the engine expects.
//!
//! [`Connection`]: crate::Connection

use std::ffi::{CStr, c_char, c_int, c_void};
use std::panic::{AssertUnwindSafe, catch_unwind};

use libsqlite3_sys::{SQLITE_DELETE, SQLITE_DENY, SQLITE_IGNORE, SQLITE_INSERT, SQLITE_OK, SQLITE_UPDATE};

/// Invoked when the engine finds the database locked. Receives the number of
/// prior invocations for the same lock; return `true` to retry, `false` to
/// give up (the pending statement then fails with `SQLITE_BUSY`).
pub type BusyHandler = Box<dyn FnMut(i32) -> bool + 'static>;

/// Invoked just before a transaction commits. Return `true` to veto the
/// commit, turning it into a rollback.
pub type CommitHandler = Box<dyn FnMut() -> bool + 'static>;

/// Invoked whenever a transaction rolls back.
pub type RollbackHandler = Box<dyn FnMut() + 'static>;

/// Invoked after a row changes: the change kind, database name, table name,
/// and the rowid of the affected row.
pub type UpdateHandler = Box<dyn FnMut(Action, &str, &str, i64) + 'static>;

/// Consulted while SQL is being compiled. Receives the raw action code and
/// up to four context strings (their meaning depends on the action); the
/// returned [`Authorization`] decides whether compilation proceeds.
pub type AuthorizeHandler =
    Box<dyn FnMut(i32, Option<&str>, Option<&str>, Option<&str>, Option<&str>) -> Authorization + 'static>;

/// Kind of row change reported to an update handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// A row was inserted.
    Insert,
    /// A row was updated.
    Update,
    /// A row was deleted.
    Delete,
    /// An opcode this wrapper does not name; carried through raw.
    Other(i32),
}

impl Action {
    fn from_code(code: c_int) -> Self {
        match code {
            SQLITE_INSERT => Action::Insert,
            SQLITE_UPDATE => Action::Update,
            SQLITE_DELETE => Action::Delete,
            other => Action::Other(other),
        }
    }
}

/// Verdict returned by an authorize handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    /// Allow the action.
    Allow,
    /// Reject the action; compilation fails with an authorization error.
    Deny,
    /// Treat the action's input as NULL / silently skip it.
    Ignore,
}

impl Authorization {
    fn into_code(self) -> c_int {
        match self {
            Authorization::Allow => SQLITE_OK,
            Authorization::Deny => SQLITE_DENY,
            Authorization::Ignore => SQLITE_IGNORE,
        }
    }
}

fn opt_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    // Engine strings are UTF-8; anything else is surfaced as absent rather
    // than panicking inside a C frame.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

// The trampolines below must not unwind into the engine's C frames. A panic
// in a user closure is caught and mapped to the conservative sentinel: stop
// retrying, veto the commit, deny the action.

pub(crate) unsafe extern "C" fn busy_handler_tramp(ctx: *mut c_void, count: c_int) -> c_int {
    let handler = unsafe { &mut *ctx.cast::<BusyHandler>() };
    match catch_unwind(AssertUnwindSafe(|| handler(count))) {
        Ok(retry) => c_int::from(retry),
        Err(_) => 0,
    }
}

pub(crate) unsafe extern "C" fn commit_hook_tramp(ctx: *mut c_void) -> c_int {
    let handler = unsafe { &mut *ctx.cast::<CommitHandler>() };
    match catch_unwind(AssertUnwindSafe(|| handler())) {
        Ok(veto) => c_int::from(veto),
        Err(_) => 1,
    }
}

pub(crate) unsafe extern "C" fn rollback_hook_tramp(ctx: *mut c_void) {
    let handler = unsafe { &mut *ctx.cast::<RollbackHandler>() };
    let _ = catch_unwind(AssertUnwindSafe(|| handler()));
}

pub(crate) unsafe extern "C" fn update_hook_tramp(
    ctx: *mut c_void,
    opcode: c_int,
    dbname: *const c_char,
    tablename: *const c_char,
    rowid: i64,
) {
    let handler = unsafe { &mut *ctx.cast::<UpdateHandler>() };
    let action = Action::from_code(opcode);
    let dbname = opt_str(dbname).unwrap_or("");
    let tablename = opt_str(tablename).unwrap_or("");
    let _ = catch_unwind(AssertUnwindSafe(|| handler(action, dbname, tablename, rowid)));
}

pub(crate) unsafe extern "C" fn authorizer_tramp(
    ctx: *mut c_void,
    action: c_int,
    arg1: *const c_char,
    arg2: *const c_char,
    dbname: *const c_char,
    trigger: *const c_char,
) -> c_int {
    let handler = unsafe { &mut *ctx.cast::<AuthorizeHandler>() };
    let verdict = catch_unwind(AssertUnwindSafe(|| {
        handler(action, opt_str(arg1), opt_str(arg2), opt_str(dbname), opt_str(trigger))
    }));
    match verdict {
        Ok(v) => v.into_code(),
        Err(_) => SQLITE_DENY,
    }
}
