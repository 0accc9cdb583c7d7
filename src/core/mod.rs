/// Core Module for ntlite
///
/// Holds the database layer (handle, query execution, records) and the
/// shared error type.

pub mod db;
pub mod error;

// Re-export commonly used types for convenience
pub use error::{NtliteError, Result};
