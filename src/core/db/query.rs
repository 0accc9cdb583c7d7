/// Query Execution Module
///
/// Runs statements against a connection and materializes their results as
/// `Record`s. Data-modifying statements open a transaction first when the
/// connection is in autocommit mode, according to the `TransactionMode`.

use crate::config::TransactionMode;
use crate::core::db::record::{Columns, Record};
use crate::core::{NtliteError, Result};
use rusqlite::{Connection, Params};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// The result of one `exec*` call.
///
/// Rows are fetched eagerly while the statement is alive, so the cursor owns
/// everything it returns and can outlive the call that produced it.
#[derive(Debug, Clone)]
pub struct ResultCursor {
    columns: Arc<Columns>,
    records: VecDeque<Record>,
    rows_affected: Option<usize>,
    last_insert_rowid: i64,
}

impl ResultCursor {
    fn empty(last_insert_rowid: i64) -> Self {
        ResultCursor {
            columns: Arc::new(Columns::new(Vec::new())),
            records: VecDeque::new(),
            rows_affected: None,
            last_insert_rowid,
        }
    }

    /// Result column names, empty for statements that return no rows.
    pub fn columns(&self) -> &[String] {
        self.columns.names()
    }

    /// Rows changed by a statement without result columns.
    ///
    /// `None` for row-returning statements and scripts.
    pub fn rows_affected(&self) -> Option<usize> {
        self.rows_affected
    }

    /// Row id of the most recent successful INSERT on the connection.
    pub fn last_insert_rowid(&self) -> i64 {
        self.last_insert_rowid
    }

    /// Number of records not yet fetched.
    pub fn remaining(&self) -> usize {
        self.records.len()
    }

    pub fn fetch_one(&mut self) -> Option<Record> {
        self.records.pop_front()
    }

    pub fn fetch_many(&mut self, count: usize) -> Vec<Record> {
        let count = count.min(self.records.len());
        self.records.drain(..count).collect()
    }

    pub fn fetch_all(self) -> Vec<Record> {
        self.records.into()
    }
}

impl Iterator for ResultCursor {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.fetch_one()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.records.len(), Some(self.records.len()))
    }
}

/// Query execution service that operates on a database connection
pub struct QueryExecutor<'a> {
    connection: &'a Connection,
    mode: TransactionMode,
}

impl<'a> QueryExecutor<'a> {
    /// Creates a new QueryExecutor for the given connection
    pub fn new(connection: &'a Connection, mode: TransactionMode) -> Self {
        QueryExecutor { connection, mode }
    }

    /// Issues `BEGIN` ahead of a data-modifying statement when no transaction is open.
    fn begin_implicit(&self, sql: &str) -> Result<()> {
        if let Some(begin) = self.mode.begin_sql() {
            if self.connection.is_autocommit() && StatementType::from_sql(sql).opens_transaction() {
                debug!("opening implicit transaction: {}", begin);
                self.connection
                    .execute_batch(begin)
                    .map_err(NtliteError::Transaction)?;
            }
        }
        Ok(())
    }

    /// Executes a single statement and collects its result.
    ///
    /// Blank or comment-only SQL yields an empty cursor.
    ///
    /// # Errors
    ///
    /// Returns `NtliteError::Statement` carrying SQLite's error if the SQL is
    /// invalid, parameters do not bind, or a constraint fails, and an
    /// `ApiMisuse` failure if `sql` holds more than one statement.
    pub fn execute<P: Params>(&self, sql: &str, params: P) -> Result<ResultCursor> {
        if !single_statement(sql)? {
            return Ok(ResultCursor::empty(self.connection.last_insert_rowid()));
        }
        let mut stmt = self.connection.prepare(sql)?;
        let columns = Arc::new(Columns::from_statement(&stmt));
        self.begin_implicit(sql)?;

        if columns.is_empty() {
            let changed = stmt.execute(params)?;
            return Ok(ResultCursor {
                columns,
                records: VecDeque::new(),
                rows_affected: Some(changed),
                last_insert_rowid: self.connection.last_insert_rowid(),
            });
        }

        let mut records = VecDeque::new();
        let mut rows = stmt.query(params)?;
        while let Some(row) = rows.next()? {
            records.push_back(Record::from_row(&columns, row)?);
        }

        Ok(ResultCursor {
            columns,
            records,
            rows_affected: None,
            last_insert_rowid: self.connection.last_insert_rowid(),
        })
    }

    /// Executes one statement once per parameter set, in order.
    ///
    /// No transaction is added beyond the implicit one; a failure part-way
    /// leaves earlier executions applied inside the open transaction.
    pub fn execute_many<I>(&self, sql: &str, params_seq: I) -> Result<ResultCursor>
    where
        I: IntoIterator,
        I::Item: Params,
    {
        if !single_statement(sql)? {
            return Ok(ResultCursor::empty(self.connection.last_insert_rowid()));
        }
        let mut stmt = self.connection.prepare(sql)?;

        let mut changed = 0;
        for (i, params) in params_seq.into_iter().enumerate() {
            if i == 0 {
                self.begin_implicit(sql)?;
            }
            changed += stmt.execute(params)?;
        }

        Ok(ResultCursor {
            rows_affected: Some(changed),
            ..ResultCursor::empty(self.connection.last_insert_rowid())
        })
    }

    /// Runs semicolon-separated statements as a script.
    ///
    /// A pending transaction is committed before the script starts.
    pub fn execute_script(&self, sql: &str) -> Result<ResultCursor> {
        if !self.connection.is_autocommit() {
            debug!("committing pending transaction before script");
            self.connection
                .execute_batch("COMMIT")
                .map_err(NtliteError::Transaction)?;
        }
        self.connection.execute_batch(sql)?;
        Ok(ResultCursor::empty(self.connection.last_insert_rowid()))
    }

    /// Executes a statement and returns its first record, if any.
    pub fn fetch_one<P: Params>(&self, sql: &str, params: P) -> Result<Option<Record>> {
        if !single_statement(sql)? {
            return Ok(None);
        }
        let mut stmt = self.connection.prepare(sql)?;
        let columns = Arc::new(Columns::from_statement(&stmt));
        self.begin_implicit(sql)?;

        let mut rows = stmt.query(params)?;
        let record = match rows.next()? {
            Some(row) => Some(Record::from_row(&columns, row)?),
            None => None,
        };
        Ok(record)
    }

    /// Executes a statement and returns every record in result order.
    pub fn fetch_all<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Record>> {
        Ok(self.execute(sql, params)?.fetch_all())
    }
}

/// Represents different SQL statement types for introspection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatementType {
    /// SELECT statement
    Select,
    /// INSERT statement
    Insert,
    /// UPDATE statement
    Update,
    /// DELETE statement
    Delete,
    /// REPLACE statement
    Replace,
    /// CREATE statement
    Create,
    /// DROP statement
    Drop,
    /// ALTER statement
    Alter,
    /// BEGIN/COMMIT/ROLLBACK/END/SAVEPOINT/RELEASE
    Transaction,
    /// Other statement types
    Other,
}

impl StatementType {
    /// Determines the statement type from the first keyword of `sql`,
    /// skipping leading whitespace and comments.
    pub fn from_sql(sql: &str) -> Self {
        let keyword: String = skip_leading_comments(sql)
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_uppercase();

        match keyword.as_str() {
            "SELECT" => StatementType::Select,
            "INSERT" => StatementType::Insert,
            "UPDATE" => StatementType::Update,
            "DELETE" => StatementType::Delete,
            "REPLACE" => StatementType::Replace,
            "CREATE" => StatementType::Create,
            "DROP" => StatementType::Drop,
            "ALTER" => StatementType::Alter,
            "BEGIN" | "COMMIT" | "ROLLBACK" | "END" | "SAVEPOINT" | "RELEASE" => {
                StatementType::Transaction
            }
            _ => StatementType::Other,
        }
    }

    /// Whether this statement runs inside an implicit transaction.
    pub fn opens_transaction(self) -> bool {
        matches!(
            self,
            StatementType::Insert
                | StatementType::Update
                | StatementType::Delete
                | StatementType::Replace
        )
    }
}

/// Checks that `sql` holds at most one statement.
///
/// Returns `false` for blank or comment-only SQL, which runs nothing.
fn single_statement(sql: &str) -> Result<bool> {
    if is_blank(sql) {
        return Ok(false);
    }
    let (_, tail) = split_first_statement(sql);
    if !is_blank(tail) {
        return Err(NtliteError::Statement(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_MISUSE),
            Some("You can only execute one statement at a time".to_string()),
        )));
    }
    Ok(true)
}

/// Whitespace, comments and empty statements only.
fn is_blank(mut sql: &str) -> bool {
    loop {
        sql = skip_leading_comments(sql);
        match sql.strip_prefix(';') {
            Some(rest) => sql = rest,
            None => return sql.is_empty(),
        }
    }
}

/// Splits `sql` just after the `;` ending its first statement.
///
/// Quoted text, identifiers and comments are skipped. Inside `CREATE TRIGGER`
/// the `;`s of the `BEGIN ... END` body belong to the statement.
fn split_first_statement(sql: &str) -> (&str, &str) {
    let bytes = sql.as_bytes();
    let trigger = is_create_trigger(sql);
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'\'' | b'"' | b'`') => i = skip_quoted(bytes, i, quote),
            b'[' => i = skip_quoted(bytes, i, b']'),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(bytes.len(), |p| i + 2 + p + 2);
            }
            b';' if depth == 0 => return sql.split_at(i + 1),
            b if trigger && (b.is_ascii_alphabetic() || b == b'_') => {
                let start = i;
                while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                    i += 1;
                }
                match sql[start..i].to_ascii_uppercase().as_str() {
                    "BEGIN" | "CASE" => depth += 1,
                    "END" => depth = depth.saturating_sub(1),
                    _ => {}
                }
            }
            _ => i += 1,
        }
    }
    (sql, "")
}

/// Index just past the closing `close` byte; doubled closers are escapes.
fn skip_quoted(bytes: &[u8], start: usize, close: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == close {
            if bytes.get(i + 1) == Some(&close) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_create_trigger(sql: &str) -> bool {
    let mut words = skip_leading_comments(sql)
        .split_whitespace()
        .map(|w| w.to_ascii_uppercase());
    if words.next().as_deref() != Some("CREATE") {
        return false;
    }
    match words.next().as_deref() {
        Some("TRIGGER") => true,
        Some("TEMP") | Some("TEMPORARY") => words.next().as_deref() == Some("TRIGGER"),
        _ => false,
    }
}

fn skip_leading_comments(mut sql: &str) -> &str {
    loop {
        sql = sql.trim_start();
        if let Some(rest) = sql.strip_prefix("--") {
            sql = rest.find('\n').map_or("", |i| &rest[i + 1..]);
        } else if let Some(rest) = sql.strip_prefix("/*") {
            sql = rest.find("*/").map_or("", |i| &rest[i + 2..]);
        } else {
            return sql;
        }
    }
}
