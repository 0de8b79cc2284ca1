//! Process-wide registry of initialized vector columns.
//!
//! Mirrors the fixed-size table array the dispatcher this module is
//! grounded on keeps: a single process-wide list, bounded so a runaway
//! caller can't exhaust memory by calling `init()` in a loop, matched
//! case-insensitively on `(table, column)`, and never compacted —
//! `cleanup()` clears a slot's preload buffer but the slot itself, once
//! allocated, stays allocated for the life of the process.

use crate::error::{Error, Result};
use crate::options::VectorOptions;
use crate::quantize::Quantizer;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::warn;

/// Hard cap on the number of distinct `(table, column)` pairs a process
/// may register, matching the fixed-size array this registry replaces.
pub const MAX_REGISTERED: usize = 128;

/// How a table's primary key is surfaced in `id`/`rowid` columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    /// No explicit integer primary key; use the implicit SQLite `rowid`.
    RowId,
    /// An explicit `INTEGER PRIMARY KEY` column with this name.
    Named(String),
}

/// Registration state for one `(table, column)` vector column.
#[derive(Debug)]
pub struct TableContext {
    /// Table name as registered, preserved for error messages.
    pub table: String,
    /// Column name as registered, preserved for error messages.
    pub column: String,
    /// Primary key resolution for this table.
    pub primary_key: PrimaryKey,
    /// Parsed and validated column options.
    pub options: VectorOptions,
    /// Trained quantizer, present once `quantize()` has run at least once.
    pub quantizer: Option<Quantizer>,
    /// In-memory preload buffer: `(row id, raw element bytes)` pairs,
    /// populated by `preload()` and consulted by `full_scan`/`quantized_scan`
    /// before falling back to the shadow table or base table.
    pub preloaded: Vec<(i64, Vec<u8>)>,
}

impl TableContext {
    fn new(
        table: String,
        column: String,
        primary_key: PrimaryKey,
        options: VectorOptions,
    ) -> Self {
        Self {
            table,
            column,
            primary_key,
            options,
            quantizer: None,
            preloaded: Vec::new(),
        }
    }

    /// Approximate resident memory used by this entry's preload buffer,
    /// for the `memory_report` diagnostic.
    #[must_use]
    pub fn memory_report(&self) -> u64 {
        self.preloaded
            .iter()
            .map(|(_, bytes)| (std::mem::size_of::<i64>() + bytes.len()) as u64)
            .sum()
    }
}

/// Process-wide, bounded, grow-only registry of vector columns.
pub struct Registry {
    entries: RwLock<Vec<Arc<RwLock<TableContext>>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    fn find_index(&self, table: &str, column: &str) -> Option<usize> {
        self.entries
            .read()
            .iter()
            .position(|e| {
                let e = e.read();
                e.table.eq_ignore_ascii_case(table) && e.column.eq_ignore_ascii_case(column)
            })
    }

    /// Registers `(table, column)` with `options`, or validates that an
    /// existing registration's options are unchanged.
    ///
    /// # Errors
    ///
    /// - [`Error::ResourceError`] if the registry is already at
    ///   [`MAX_REGISTERED`] entries and this is a new `(table, column)`.
    /// - [`Error::SchemaError`] if `(table, column)` is already registered
    ///   with different options (re-`init()` with a changed shape).
    pub fn init(
        &self,
        table: &str,
        column: &str,
        primary_key: PrimaryKey,
        options: VectorOptions,
    ) -> Result<Arc<RwLock<TableContext>>> {
        if let Some(idx) = self.find_index(table, column) {
            let entry = self.entries.read()[idx].clone();
            {
                let existing = entry.read();
                if existing.options != options {
                    return Err(Error::SchemaError(format!(
                        "table '{table}' column '{column}' is already initialized with different options"
                    )));
                }
            }
            return Ok(entry);
        }

        let mut entries = self.entries.write();
        if entries.len() >= MAX_REGISTERED {
            warn!(
                table,
                column, MAX_REGISTERED, "rejecting registration: registry capacity reached"
            );
            return Err(Error::ResourceError(format!(
                "cannot register table '{table}' column '{column}': maximum of {MAX_REGISTERED} registered vector columns reached"
            )));
        }
        let entry = Arc::new(RwLock::new(TableContext::new(
            table.to_string(),
            column.to_string(),
            primary_key,
            options,
        )));
        entries.push(entry.clone());
        Ok(entry)
    }

    /// Looks up an already-registered `(table, column)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateError`] if the pair was never registered.
    pub fn get(&self, table: &str, column: &str) -> Result<Arc<RwLock<TableContext>>> {
        self.find_index(table, column)
            .map(|idx| self.entries.read()[idx].clone())
            .ok_or_else(|| {
                Error::StateError(format!(
                    "table '{table}' column '{column}' has not been initialized; call init() first"
                ))
            })
    }

    /// Zeros the quantization and preload state for `(table, column)`
    /// without removing its registration; the slot remains allocated, the
    /// column's declared options are untouched, and a subsequent
    /// `quantize()`/`preload()` starts from fresh state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateError`] if the pair was never registered.
    pub fn cleanup(&self, table: &str, column: &str) -> Result<()> {
        let entry = self.get(table, column)?;
        let mut entry = entry.write();
        entry.quantizer = None;
        entry.preloaded.clear();
        Ok(())
    }

    /// Number of registered entries, regardless of preload state.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// `true` if no `(table, column)` pair has ever been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total approximate preload memory across every registered column.
    #[must_use]
    pub fn memory_report(&self) -> u64 {
        self.entries
            .read()
            .iter()
            .map(|e| e.read().memory_report())
            .sum()
    }
}
