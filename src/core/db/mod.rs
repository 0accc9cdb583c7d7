/// Database Module
///
/// The database layer is split into three concerns:
/// - **Connection Management** (`connection.rs`): the `Handle`, its lifecycle and transactions
/// - **Query Execution** (`query.rs`): running statements and materializing results
/// - **Records** (`record.rs`): result rows as ordered, named, immutable values
///
/// ## Error Handling
///
/// All operations return `NtliteError`, carrying SQLite's own error as the source.
pub mod connection;
pub mod query;
pub mod record;

pub use connection::*;
pub use query::*;
pub use record::*;
