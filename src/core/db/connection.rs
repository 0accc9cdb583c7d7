/// Connection Management Module
///
/// Provides the `Handle`: one exclusively owned SQLite connection plus the
/// short-named operations that run statements on it and manage its
/// transaction.

use crate::config::{HandleConfig, MEMORY_PATH};
use crate::core::db::query::{QueryExecutor, ResultCursor};
use crate::core::db::record::Record;
use crate::core::{NtliteError, Result};
use rusqlite::{Connection, Params};
use tracing::{debug, warn};

/// An open connection to an embedded SQLite store.
///
/// A handle moves between threads but cannot be shared by reference across
/// them; callers that need shared access wrap it in a `Mutex`. Once
/// [`Handle::close`] has run, every operation returns
/// [`NtliteError::ClosedHandle`]. Dropping an open handle closes it.
#[derive(Debug)]
pub struct Handle {
    config: HandleConfig,
    connection: Option<Connection>,
}

impl Handle {
    /// Opens the store at `path`, creating the file if it does not exist.
    ///
    /// Pass [`MEMORY_PATH`] (`":memory:"`) for a transient in-process store.
    ///
    /// # Errors
    ///
    /// `NtliteError::Connection` if SQLite cannot open the path (missing
    /// directory, permission denied, not a database).
    ///
    /// # Examples
    ///
    /// ```
    /// let mut db = ntlite::Handle::open(":memory:")?;
    /// db.exec_script("CREATE TABLE t(a INT, b TEXT)")?;
    /// db.exec("INSERT INTO t VALUES (?1, ?2)", (1, "x"))?;
    /// db.commit()?;
    /// let row = db.get("SELECT a, b FROM t", [])?.unwrap();
    /// assert_eq!(row.get_as::<i64>("a").unwrap(), 1);
    /// db.close()?;
    /// # Ok::<(), ntlite::NtliteError>(())
    /// ```
    pub fn open(path: impl Into<String>) -> Result<Self> {
        Handle::open_with_config(HandleConfig::new(path))
    }

    /// Opens a transient in-process store.
    pub fn open_in_memory() -> Result<Self> {
        Handle::open(MEMORY_PATH)
    }

    /// Opens a store and applies the connection settings in `config`.
    pub fn open_with_config(config: HandleConfig) -> Result<Self> {
        config.validate()?;

        let connection_error = |source| NtliteError::Connection {
            path: config.path.clone(),
            source,
        };

        let conn = Connection::open(&config.path).map_err(connection_error)?;
        conn.busy_timeout(config.busy_timeout())
            .map_err(connection_error)?;
        if let Some(enabled) = config.foreign_keys {
            conn.pragma_update(None, "foreign_keys", enabled)
                .map_err(connection_error)?;
        }
        if let Some(mode) = &config.journal_mode {
            let applied: String = conn
                .pragma_update_and_check(None, "journal_mode", mode, |row| row.get(0))
                .map_err(connection_error)?;
            debug!("journal_mode set to {}", applied);
        }

        debug!("opened {} ({:?})", config.path, config.transaction_mode);
        Ok(Handle {
            config,
            connection: Some(conn),
        })
    }

    /// Opens `path`, runs `f`, and closes the handle on every exit path.
    ///
    /// An error from `f` takes precedence over an error from closing.
    pub fn scope<T, F>(path: impl Into<String>, f: F) -> Result<T>
    where
        F: FnOnce(&mut Handle) -> Result<T>,
    {
        let mut handle = Handle::open(path)?;
        let outcome = f(&mut handle);
        let closed = handle.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    /// The path this handle was opened with.
    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    /// The underlying connection, for operations the handle does not wrap.
    pub fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(NtliteError::ClosedHandle)
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    /// Whether a transaction is currently open on the connection.
    pub fn in_transaction(&self) -> Result<bool> {
        Ok(!self.connection()?.is_autocommit())
    }

    fn executor(&self) -> Result<QueryExecutor<'_>> {
        Ok(QueryExecutor::new(self.connection()?, self.config.transaction_mode))
    }

    /// Runs a single statement with positional or named parameters.
    pub fn exec<P: Params>(&self, sql: &str, params: P) -> Result<ResultCursor> {
        self.executor()?.execute(sql, params)
    }

    /// Runs one statement once for each parameter set.
    pub fn exec_many<I>(&self, sql: &str, params_seq: I) -> Result<ResultCursor>
    where
        I: IntoIterator,
        I::Item: Params,
    {
        self.executor()?.execute_many(sql, params_seq)
    }

    /// Runs a semicolon-separated script.
    pub fn exec_script(&self, sql: &str) -> Result<ResultCursor> {
        self.executor()?.execute_script(sql)
    }

    /// Returns the first record, or `None` for an empty result.
    pub fn get<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>> {
        self.executor()?.fetch_one(sql, params)
    }

    /// Returns every record in result order; empty results yield an empty `Vec`.
    pub fn get_all<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        self.executor()?.fetch_all(sql, params)
    }

    /// Commits the open transaction.
    ///
    /// # Errors
    ///
    /// `NtliteError::Transaction` with SQLite's error when no transaction is
    /// active or the commit is rejected.
    pub fn commit(&self) -> Result<()> {
        debug!("commit on {}", self.config.path);
        self.connection()?
            .execute_batch("COMMIT")
            .map_err(NtliteError::Transaction)
    }

    /// Rolls back the open transaction. Fails like [`Handle::commit`].
    pub fn rollback(&self) -> Result<()> {
        debug!("rollback on {}", self.config.path);
        self.connection()?
            .execute_batch("ROLLBACK")
            .map_err(NtliteError::Transaction)
    }

    /// Closes the connection. Closing an already closed handle is a no-op.
    ///
    /// An uncommitted transaction is discarded by SQLite. If SQLite refuses to
    /// close, the connection is still released when the handle is dropped.
    pub fn close(&mut self) -> Result<()> {
        let Some(conn) = self.connection.take() else {
            return Ok(());
        };
        debug!("closing {}", self.config.path);
        conn.close().map_err(|(conn, source)| {
            self.connection = Some(conn);
            NtliteError::Connection {
                path: self.config.path.clone(),
                source,
            }
        })
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if let Some(conn) = self.connection.take() {
            if let Err((_, e)) = conn.close() {
                warn!("failed to close {}: {}", self.config.path, e);
            }
        }
    }
}
