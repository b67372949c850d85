use thiserror::Error;

/// Error raised by every throwing wrapper operation.
///
/// The message is captured at construction time, either from a literal
/// diagnostic or from the owning connection's last-error text at the moment
/// of failure. Raw (`e`-prefixed) operations never construct this type; they
/// return the engine's status code untranslated so callers can branch without
/// error-type control flow.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct DatabaseError {
    message: String,
}

impl DatabaseError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The engine's diagnostic text.
    ///
    /// Callers wanting finer detail can combine this with
    /// [`Connection::error_code`](crate::Connection::error_code) after a
    /// failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result alias used across the crate.
pub type Result<T, E = DatabaseError> = std::result::Result<T, E>;
