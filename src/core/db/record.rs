/// Record Module
///
/// Result rows are represented as ordered, immutable name/value sets. The
/// column names are read from the statement once per execution and shared by
/// every record produced by that execution.

use rusqlite::types::{FromSql, Value};
use rusqlite::{Row, Statement};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Column names of one statement execution with a name-to-index lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    /// Builds the column set from names in result order.
    ///
    /// A repeated name keeps every position; lookups by name resolve to the
    /// first occurrence.
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            index.entry(name.clone()).or_insert(i);
        }
        Columns { names, index }
    }

    /// Reads the result column names of a prepared statement.
    pub fn from_statement(stmt: &Statement<'_>) -> Self {
        Columns::new(stmt.column_names().into_iter().map(String::from).collect())
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A single result row.
///
/// Field names follow the statement's result columns in order and count;
/// values are SQLite's own dynamically typed `Value`s.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    columns: Arc<Columns>,
    values: Vec<Value>,
}

impl Record {
    /// Creates a record from shared columns and one value per column.
    ///
    /// Returns `None` if the value count differs from the column count.
    pub fn new(columns: Arc<Columns>, values: Vec<Value>) -> Option<Self> {
        if columns.len() != values.len() {
            return None;
        }
        Some(Record { columns, values })
    }

    /// Reads every column of the current row.
    pub(crate) fn from_row(columns: &Arc<Columns>, row: &Row<'_>) -> rusqlite::Result<Self> {
        let values = (0..columns.len())
            .map(|i| row.get::<_, Value>(i))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Record {
            columns: Arc::clone(columns),
            values,
        })
    }

    /// Returns the value of the named field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns.position(name).map(|i| &self.values[i])
    }

    /// Returns the value at `index` in column order.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Converts the named field into a Rust type using SQLite's conversion rules.
    ///
    /// # Errors
    ///
    /// `InvalidColumnName` if no such field exists, or the conversion error
    /// raised by `FromSql`.
    pub fn get_as<T: FromSql>(&self, name: &str) -> rusqlite::Result<T> {
        let index = self
            .columns
            .position(name)
            .ok_or_else(|| rusqlite::Error::InvalidColumnName(name.to_string()))?;
        let value = &self.values[index];
        T::column_result(value.into()).map_err(|e| match e {
            rusqlite::types::FromSqlError::InvalidType => {
                rusqlite::Error::InvalidColumnType(index, name.to_string(), value.data_type())
            }
            other => rusqlite::Error::FromSqlConversionFailure(
                index,
                value.data_type(),
                Box::new(other),
            ),
        })
    }

    /// Field names in column order, duplicates included.
    pub fn names(&self) -> &[String] {
        self.columns.names()
    }

    pub fn columns(&self) -> &Arc<Columns> {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates `(name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Renders the record as a JSON object in column order.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

struct SqlValue<'a>(&'a Value);

impl Serialize for SqlValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self.0 {
            Value::Null => serializer.serialize_unit(),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::Real(f) => serializer.serialize_f64(*f),
            Value::Text(t) => serializer.serialize_str(t),
            Value::Blob(b) => serializer.collect_seq(b.iter()),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &SqlValue(value))?;
        }
        map.end()
    }
}
