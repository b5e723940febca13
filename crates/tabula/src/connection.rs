//! The connection seam.
//!
//! The engine does not own a driver: it only needs a handle that can
//! execute SQL text and return tabular results. Callers implement
//! [`Connection`] for whatever client they already hold; connection
//! acquisition, pooling and transaction policy stay on their side.

use crate::Result;

/// A single cell of a metadata result set.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// One row of a tabular result, with named columns.
#[derive(Debug, Clone)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from parallel column/value lists.
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Get a cell by column name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    /// Get a text cell by column name.
    pub fn get_str(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(Value::Text(s)) => Ok(s),
            other => Err(crate::Error::Metadata(format!(
                "expected text in column {name}, got {other:?}"
            ))),
        }
    }

    /// Get an integer cell by column name.
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        match self.get(name) {
            Some(Value::Integer(v)) => Ok(*v),
            other => Err(crate::Error::Metadata(format!(
                "expected integer in column {name}, got {other:?}"
            ))),
        }
    }

    /// Get an integer cell interpreted as a flag (nonzero = true).
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        Ok(self.get_i64(name)? != 0)
    }
}

type BoxFuture<'a, T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Trait for database connections that can execute SQL text.
///
/// Implementations should return driver errors through
/// [`Error::database`](crate::Error::database).
pub trait Connection: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64>>;

    /// Execute a query, returning all rows.
    fn query<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<Vec<Row>>>;
}
