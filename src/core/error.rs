/// ntlite Error Module
///
/// This module defines the error taxonomy for the handle. Errors raised by
/// SQLite are never translated: each variant carries the native
/// `rusqlite::Error` as its source so callers can inspect it unchanged.
use thiserror::Error;

/// Error type for every fallible handle operation.
///
/// - Opening or closing the store (`Connection`)
/// - Running statements and fetching rows (`Statement`)
/// - Committing and rolling back (`Transaction`)
/// - Using a handle after `close()` (`ClosedHandle`)
/// - Loading configuration (`Config`, `Io`)
#[derive(Error, Debug)]
pub enum NtliteError {
    /// The store at `path` could not be opened or released
    #[error("Connection error ({path}): {source}")]
    Connection {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Malformed SQL, bad parameter binding, constraint violations
    #[error("Statement error: {0}")]
    Statement(#[from] rusqlite::Error),

    /// COMMIT or ROLLBACK rejected by the store
    #[error("Transaction error: {0}")]
    Transaction(#[source] rusqlite::Error),

    /// The handle was closed before this call
    #[error("Handle is closed")]
    ClosedHandle,

    /// Configuration parsing and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system errors while reading configuration
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NtliteError {
    /// Returns the native SQLite error code, if the error came from SQLite.
    pub fn sqlite_code(&self) -> Option<rusqlite::ErrorCode> {
        match self.sqlite_error()? {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
            _ => None,
        }
    }

    /// Returns the underlying driver error without any wrapping.
    pub fn sqlite_error(&self) -> Option<&rusqlite::Error> {
        match self {
            NtliteError::Connection { source, .. } => Some(source),
            NtliteError::Statement(source) | NtliteError::Transaction(source) => Some(source),
            _ => None,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, NtliteError>;
