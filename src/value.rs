use std::ffi::CStr;

use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT, sqlite3_column_blob,
    sqlite3_column_bytes, sqlite3_column_double, sqlite3_column_int64, sqlite3_column_text,
    sqlite3_column_type,
};

use crate::query::Row;

/// A value bindable to a statement parameter.
///
/// One variant per bindable kind; [`Statement::bind`](crate::Statement::bind)
/// dispatches on the tag. Unsigned integers are widened into signed 64-bit on
/// the wire, matching the engine's storage model.
///
/// Text and blob variants come in two retention modes:
///
/// - [`Text`](Value::Text) / [`Blob`](Value::Blob) — the engine copies the
///   bytes before returning (`SQLITE_TRANSIENT`), so the source buffer may be
///   mutated or dropped immediately after the bind call.
/// - [`StaticText`](Value::StaticText) / [`StaticBlob`](Value::StaticBlob) —
///   no copy is made (`SQLITE_STATIC`); the `'static` bound stands in for the
///   caller-guarantees-lifetime contract.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit unsigned integer, widened to `i64`.
    UInt(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer, reinterpreted as `i64` on the wire.
    UInt64(u64),
    /// 64-bit float.
    Double(f64),
    /// Text, copied by the engine.
    Text(&'a str),
    /// Text with caller-guaranteed lifetime, not copied.
    StaticText(&'static str),
    /// Binary blob, copied by the engine.
    Blob(&'a [u8]),
    /// Blob with caller-guaranteed lifetime, not copied.
    StaticBlob(&'static [u8]),
    /// SQL NULL.
    Null,
}

impl From<i32> for Value<'_> {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value<'_> {
    fn from(v: u32) -> Self {
        Value::UInt(v)
    }
}

impl From<i64> for Value<'_> {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<u64> for Value<'_> {
    fn from(v: u64) -> Self {
        Value::UInt64(v)
    }
}

impl From<f64> for Value<'_> {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl<'a> From<&'a str> for Value<'a> {
    fn from(v: &'a str) -> Self {
        Value::Text(v)
    }
}

impl<'a> From<&'a [u8]> for Value<'a> {
    fn from(v: &'a [u8]) -> Self {
        Value::Blob(v)
    }
}

/// Storage class of a column in the current row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 64-bit signed integer storage.
    Integer,
    /// 64-bit float storage.
    Float,
    /// UTF-8 text storage.
    Text,
    /// Binary blob storage.
    Blob,
    /// SQL NULL.
    Null,
}

impl ColumnType {
    pub(crate) fn from_code(code: i32) -> Self {
        match code {
            SQLITE_INTEGER => ColumnType::Integer,
            SQLITE_FLOAT => ColumnType::Float,
            SQLITE_TEXT => ColumnType::Text,
            SQLITE_BLOB => ColumnType::Blob,
            // SQLITE_NULL and anything future-proof
            _ => ColumnType::Null,
        }
    }
}

/// Typed extraction of a column value from a [`Row`].
///
/// Implementations read through the engine's per-type column accessors, so a
/// requested type that mismatches the storage class follows the engine's own
/// coercion rules (numeric widening, text/blob reinterpretation). No extra
/// validation is layered on top: the narrowing `i32`/`u32` reads truncate,
/// and `String` replaces invalid UTF-8 rather than failing.
pub trait FromColumn: Sized {
    /// Read column `idx` (0-based) of the row as `Self`.
    fn from_column(row: &Row<'_>, idx: i32) -> Self;
}

impl FromColumn for i64 {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        unsafe { sqlite3_column_int64(row.handle(), idx) }
    }
}

impl FromColumn for u64 {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        i64::from_column(row, idx) as u64
    }
}

impl FromColumn for i32 {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        i64::from_column(row, idx) as i32
    }
}

impl FromColumn for u32 {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        u64::from_column(row, idx) as u32
    }
}

impl FromColumn for f64 {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        unsafe { sqlite3_column_double(row.handle(), idx) }
    }
}

impl FromColumn for bool {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        i64::from_column(row, idx) != 0
    }
}

impl FromColumn for String {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        let stmt = row.handle();
        unsafe {
            let ptr = sqlite3_column_text(stmt, idx);
            if ptr.is_null() {
                return String::new();
            }
            CStr::from_ptr(ptr.cast()).to_string_lossy().into_owned()
        }
    }
}

impl FromColumn for Vec<u8> {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        let stmt = row.handle();
        unsafe {
            let ptr = sqlite3_column_blob(stmt, idx);
            if ptr.is_null() {
                return Vec::new();
            }
            let len = sqlite3_column_bytes(stmt, idx);
            std::slice::from_raw_parts(ptr.cast::<u8>(), len as usize).to_vec()
        }
    }
}

/// `None` when the column holds SQL NULL, otherwise the inner extraction.
impl<T: FromColumn> FromColumn for Option<T> {
    fn from_column(row: &Row<'_>, idx: i32) -> Self {
        let code = unsafe { sqlite3_column_type(row.handle(), idx) };
        if code == SQLITE_NULL {
            None
        } else {
            Some(T::from_column(row, idx))
        }
    }
}

/// Owned snapshot of a bound parameter, kept so multi-statement execution can
/// re-apply bindings to each successive compiled form.
#[derive(Debug, Clone)]
pub(crate) enum StoredValue {
    Int64(i64),
    Double(f64),
    Text(String),
    StaticText(&'static str),
    Blob(Vec<u8>),
    StaticBlob(&'static [u8]),
    Null,
}

impl StoredValue {
    /// Snapshot a bind value, widening integers the way the wire does.
    pub(crate) fn record(value: &Value<'_>) -> Self {
        match value {
            Value::Int(v) => StoredValue::Int64(i64::from(*v)),
            Value::UInt(v) => StoredValue::Int64(i64::from(*v)),
            Value::Int64(v) => StoredValue::Int64(*v),
            Value::UInt64(v) => StoredValue::Int64(*v as i64),
            Value::Double(v) => StoredValue::Double(*v),
            Value::Text(v) => StoredValue::Text((*v).to_owned()),
            Value::StaticText(v) => StoredValue::StaticText(v),
            Value::Blob(v) => StoredValue::Blob((*v).to_vec()),
            Value::StaticBlob(v) => StoredValue::StaticBlob(v),
            Value::Null => StoredValue::Null,
        }
    }

    /// View the snapshot as a bindable value again.
    pub(crate) fn as_value(&self) -> Value<'_> {
        match self {
            StoredValue::Int64(v) => Value::Int64(*v),
            StoredValue::Double(v) => Value::Double(*v),
            StoredValue::Text(v) => Value::Text(v),
            StoredValue::StaticText(v) => Value::StaticText(v),
            StoredValue::Blob(v) => Value::Blob(v),
            StoredValue::StaticBlob(v) => Value::StaticBlob(v),
            StoredValue::Null => Value::Null,
        }
    }
}
