//! Narrow trait abstraction over the host relational database.
//!
//! The core never opens a database file, parses SQL, or implements a
//! virtual table itself — it only needs to prepare/step/finalize
//! statements, bind typed parameters, read typed columns, run DDL/DML,
//! and bracket a transaction. Everything above that (query planning,
//! VTab registration, scalar-function binding) belongs to a concrete
//! adapter such as [`rusqlite_host`].

#[cfg(feature = "rusqlite_host")]
pub mod rusqlite_host;

use crate::error::Result;

/// A host database connection, sufficient to run the DDL/DML and scans
/// the core issues.
pub trait Connection {
    /// The prepared-statement type this connection produces.
    type Stmt<'c>: Statement
    where
        Self: 'c;

    /// Prepares `sql` for execution.
    fn prepare<'c>(&'c self, sql: &str) -> Result<Self::Stmt<'c>>;

    /// Runs a DDL/DML statement with no result rows.
    fn exec(&self, sql: &str) -> Result<()>;

    /// Runs a statement expected to produce a single `INTEGER` (or `NULL`)
    /// value, such as `SELECT SUM(LENGTH(data)) FROM ...`.
    fn exec_scalar_int64(&self, sql: &str) -> Result<Option<i64>>;

    /// Begins a transaction.
    fn begin(&self) -> Result<()>;

    /// Commits the current transaction.
    fn commit(&self) -> Result<()>;

    /// Rolls back the current transaction.
    fn rollback(&self) -> Result<()>;
}

/// A single prepared statement, stepped row by row.
pub trait Statement {
    /// Binds an `i64` to a 1-based parameter index.
    fn bind_i64(&mut self, index: usize, value: i64) -> Result<()>;

    /// Binds a `BLOB` to a 1-based parameter index.
    fn bind_blob(&mut self, index: usize, value: &[u8]) -> Result<()>;

    /// Binds a `TEXT` to a 1-based parameter index.
    fn bind_text(&mut self, index: usize, value: &str) -> Result<()>;

    /// Binds a `REAL` to a 1-based parameter index.
    fn bind_f64(&mut self, index: usize, value: f64) -> Result<()>;

    /// Advances to the next row. Returns `false` once rows are exhausted.
    fn step(&mut self) -> Result<bool>;

    /// Reads a 0-based column as `i64`.
    fn column_i64(&self, index: usize) -> Result<i64>;

    /// Reads a 0-based column as a `BLOB`.
    fn column_blob(&self, index: usize) -> Result<&[u8]>;

    /// Reads a 0-based column as `TEXT`.
    fn column_text(&self, index: usize) -> Result<&str>;

    /// Reads a 0-based column as `REAL`.
    fn column_f64(&self, index: usize) -> Result<f64>;
}
