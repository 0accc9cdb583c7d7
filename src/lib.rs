//! A small convenience handle over an embedded SQLite store.
//!
//! [`Handle`] owns one connection and exposes short-named operations
//! (`exec`, `exec_many`, `exec_script`, `get`, `get_all`, `commit`,
//! `rollback`) returning rows as [`Record`]s keyed by result column name.

// Core infrastructure modules
pub mod core;

pub mod config;

pub use crate::config::{HandleConfig, TransactionMode, MEMORY_PATH};
pub use crate::core::db::{Columns, Handle, QueryExecutor, Record, ResultCursor, StatementType};
pub use crate::core::{NtliteError, Result};
pub use rusqlite::types::Value;
pub use rusqlite::{named_params, params};
