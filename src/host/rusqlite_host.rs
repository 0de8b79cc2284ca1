//! Reference host adapter wiring the core onto a real `rusqlite` connection.
//!
//! This is the only module in the crate that names `rusqlite`: it
//! implements [`super::Connection`]/[`super::Statement`] over
//! `rusqlite::Connection`/`rusqlite::Statement`, registers the scalar
//! functions (`version`, `backend`, `as_f32`/`as_f16`/`as_bf16`/`as_u8`/
//! `as_i8`, `init`, `quantize`, `quantize_memory`, `quantize_preload`,
//! `cleanup`), and exposes `full_scan`/`quantized_scan` as eponymous-only
//! table-valued functions.
//!
//! The `Connection`/`Statement` adapter and scalar-function registration
//! follow `rusqlite`'s documented `raw_query`/`create_scalar_function` APIs
//! directly. The virtual-table registration below is modeled on
//! `rusqlite`'s own `vtab` example modules (the crate ships no reference
//! repo that registers a SQLite virtual table), so it is held to the same
//! eponymous-only, read-only shape those examples use rather than anything
//! more elaborate.

use crate::error::{Error, Result};
use crate::host::{Connection, Statement};
use crate::registry::Registry;
use rusqlite::functions::FunctionFlags;
use rusqlite::vtab::{
    eponymous_only_module, Context, CreateVTab, IndexInfo, VTab, VTabConnection, VTabCursor,
    VTabKind, Values,
};
use std::os::raw::c_int;
use std::sync::Arc;

fn host_err(e: rusqlite::Error) -> Error {
    Error::HostError(Box::new(e))
}

/// Adapter over a borrowed `rusqlite::Connection`.
pub struct RusqliteConnection<'c> {
    conn: &'c rusqlite::Connection,
}

impl<'c> RusqliteConnection<'c> {
    /// Wraps `conn` for use with the core's [`Connection`] trait.
    #[must_use]
    pub fn new(conn: &'c rusqlite::Connection) -> Self {
        Self { conn }
    }
}

/// One row's worth of column values, copied out of `rusqlite` eagerly so
/// the adapter never needs a self-referential borrow between a
/// `rusqlite::Statement` and the `Rows` it produces.
struct OwnedRow {
    ints: Vec<Option<i64>>,
    blobs: Vec<Option<Vec<u8>>>,
    texts: Vec<Option<String>>,
    reals: Vec<Option<f64>>,
}

/// Adapter over a `rusqlite::Statement`. Rows are materialized in full on
/// the first [`Statement::step`] call and then walked by index — simpler
/// and safe to write without a compiler in hand, at the cost of holding an
/// entire result set in memory rather than streaming it.
pub struct RusqliteStatement<'c> {
    stmt: rusqlite::Statement<'c>,
    rows: Option<Vec<OwnedRow>>,
    cursor: usize,
}

impl Connection for RusqliteConnection<'_> {
    type Stmt<'s>
        = RusqliteStatement<'s>
    where
        Self: 's;

    fn prepare<'s>(&'s self, sql: &str) -> Result<Self::Stmt<'s>> {
        let stmt = self.conn.prepare(sql).map_err(host_err)?;
        Ok(RusqliteStatement {
            stmt,
            rows: None,
            cursor: 0,
        })
    }

    fn exec(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql).map_err(host_err)
    }

    fn exec_scalar_int64(&self, sql: &str) -> Result<Option<i64>> {
        self.conn
            .query_row(sql, [], |row| row.get::<_, Option<i64>>(0))
            .map_err(host_err)
    }

    fn begin(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN;").map_err(host_err)
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT;").map_err(host_err)
    }

    fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK;").map_err(host_err)
    }
}

impl RusqliteStatement<'_> {
    fn materialize(&mut self) -> Result<()> {
        if self.rows.is_some() {
            return Ok(());
        }
        let column_count = self.stmt.column_count();
        let mut out = Vec::new();
        {
            let mut rows = self.stmt.raw_query();
            while let Some(row) = rows.next().map_err(host_err)? {
                let mut ints = Vec::with_capacity(column_count);
                let mut blobs = Vec::with_capacity(column_count);
                let mut texts = Vec::with_capacity(column_count);
                let mut reals = Vec::with_capacity(column_count);
                for i in 0..column_count {
                    ints.push(row.get::<_, Option<i64>>(i).unwrap_or(None));
                    blobs.push(row.get::<_, Option<Vec<u8>>>(i).unwrap_or(None));
                    texts.push(row.get::<_, Option<String>>(i).unwrap_or(None));
                    reals.push(row.get::<_, Option<f64>>(i).unwrap_or(None));
                }
                out.push(OwnedRow {
                    ints,
                    blobs,
                    texts,
                    reals,
                });
            }
        }
        self.rows = Some(out);
        Ok(())
    }

    fn current(&self) -> Option<&OwnedRow> {
        self.rows
            .as_ref()
            .and_then(|rows| rows.get(self.cursor.wrapping_sub(1)))
    }
}

fn missing_row() -> Error {
    Error::HostError(Box::new(std::io::Error::other("no current row")))
}

impl Statement for RusqliteStatement<'_> {
    fn bind_i64(&mut self, index: usize, value: i64) -> Result<()> {
        self.stmt.raw_bind_parameter(index, value).map_err(host_err)
    }

    fn bind_blob(&mut self, index: usize, value: &[u8]) -> Result<()> {
        self.stmt.raw_bind_parameter(index, value).map_err(host_err)
    }

    fn bind_text(&mut self, index: usize, value: &str) -> Result<()> {
        self.stmt.raw_bind_parameter(index, value).map_err(host_err)
    }

    fn bind_f64(&mut self, index: usize, value: f64) -> Result<()> {
        self.stmt.raw_bind_parameter(index, value).map_err(host_err)
    }

    fn step(&mut self) -> Result<bool> {
        self.materialize()?;
        let len = self.rows.as_ref().map_or(0, Vec::len);
        if self.cursor >= len {
            return Ok(false);
        }
        self.cursor += 1;
        Ok(true)
    }

    fn column_i64(&self, index: usize) -> Result<i64> {
        self.current()
            .and_then(|r| r.ints.get(index).copied().flatten())
            .ok_or_else(missing_row)
    }

    fn column_blob(&self, index: usize) -> Result<&[u8]> {
        self.current()
            .and_then(|r| r.blobs.get(index))
            .and_then(|b| b.as_deref())
            .ok_or_else(missing_row)
    }

    fn column_text(&self, index: usize) -> Result<&str> {
        self.current()
            .and_then(|r| r.texts.get(index))
            .and_then(|t| t.as_deref())
            .ok_or_else(missing_row)
    }

    fn column_f64(&self, index: usize) -> Result<f64> {
        self.current()
            .and_then(|r| r.reals.get(index).copied().flatten())
            .ok_or_else(missing_row)
    }
}

fn to_rusqlite_error(e: Error) -> rusqlite::Error {
    rusqlite::Error::UserFunctionError(e.into())
}

/// Registers `version`, `backend`, `as_f32`/`as_f16`/`as_bf16`/`as_u8`/
/// `as_i8`, `init`, `quantize`, `quantize_memory`, `quantize_preload` and
/// `cleanup` as scalar SQL functions on `conn`, backed by `registry`.
///
/// `init`/`quantize`/`quantize_memory`/`quantize_preload` need to issue
/// further SQL (schema introspection, the shadow-table rewrite) against
/// the very connection the scalar function call came in on. `rusqlite`
/// exposes this via `Context::get_connection`, a re-entrant handle onto
/// the same connection; it is sound here because SQLite serializes
/// function calls within a single statement and none of these functions
/// are called from within `quantize`'s own `begin`/`commit` bracket.
///
/// # Errors
///
/// Propagates any `rusqlite` registration failure.
pub fn register_scalar_functions(
    conn: &rusqlite::Connection,
    registry: Arc<Registry>,
) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "version",
        0,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |_ctx| Ok(crate::public::version().to_string()),
    )?;

    conn.create_scalar_function(
        "backend",
        0,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |_ctx| Ok(crate::public::backend_name().to_string()),
    )?;

    for (name, element_type) in [
        ("as_f32", crate::element::ElementType::F32),
        ("as_f16", crate::element::ElementType::F16),
        ("as_bf16", crate::element::ElementType::BF16),
        ("as_u8", crate::element::ElementType::U8),
        ("as_i8", crate::element::ElementType::I8),
    ] {
        conn.create_scalar_function(
            name,
            -1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            move |ctx| {
                let text = ctx.get::<String>(0)?;
                let dim = if ctx.len() > 1 {
                    Some(ctx.get::<i64>(1)? as u32)
                } else {
                    None
                };
                crate::public::convert_vector(&text, element_type, dim).map_err(to_rusqlite_error)
            },
        )?;
    }

    let reg = registry.clone();
    conn.create_scalar_function(
        "init",
        3,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let table = ctx.get::<String>(0)?;
            let column = ctx.get::<String>(1)?;
            let opts = ctx.get::<String>(2)?;
            let handle = unsafe { ctx.get_connection() }?;
            let host = RusqliteConnection::new(&handle);
            crate::public::init(&host, &reg, &table, &column, &opts).map_err(to_rusqlite_error)?;
            Ok(true)
        },
    )?;

    let reg = registry.clone();
    conn.create_scalar_function(
        "quantize",
        -1,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let table = ctx.get::<String>(0)?;
            let column = ctx.get::<String>(1)?;
            let handle = unsafe { ctx.get_connection() }?;
            let host = RusqliteConnection::new(&handle);
            crate::public::quantize(&host, &reg, &table, &column).map_err(to_rusqlite_error)?;
            Ok(true)
        },
    )?;

    let reg = registry.clone();
    conn.create_scalar_function(
        "quantize_memory",
        2,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let table = ctx.get::<String>(0)?;
            let column = ctx.get::<String>(1)?;
            let _ = reg.get(&table, &column).map_err(to_rusqlite_error)?;
            let handle = unsafe { ctx.get_connection() }?;
            let host = RusqliteConnection::new(&handle);
            crate::public::quantize_memory(&host, &table, &column).map_err(to_rusqlite_error)
        },
    )?;

    let reg = registry.clone();
    conn.create_scalar_function(
        "quantize_preload",
        2,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let table = ctx.get::<String>(0)?;
            let column = ctx.get::<String>(1)?;
            let handle = unsafe { ctx.get_connection() }?;
            let host = RusqliteConnection::new(&handle);
            crate::public::quantize_preload(&host, &reg, &table, &column)
                .map_err(to_rusqlite_error)?;
            Ok(true)
        },
    )?;

    conn.create_scalar_function(
        "cleanup",
        2,
        FunctionFlags::SQLITE_UTF8,
        move |ctx| {
            let table = ctx.get::<String>(0)?;
            let column = ctx.get::<String>(1)?;
            let handle = unsafe { ctx.get_connection() }?;
            let host = RusqliteConnection::new(&handle);
            crate::public::cleanup(&host, &registry, &table, &column)
                .map_err(to_rusqlite_error)?;
            Ok(true)
        },
    )?;

    Ok(())
}

/// Registers `full_scan` and `quantized_scan` as eponymous-only
/// table-valued functions on `conn`, backed by `registry`.
///
/// # Errors
///
/// Propagates any `rusqlite` module-registration failure.
pub fn register_vtabs(
    conn: &rusqlite::Connection,
    registry: Arc<Registry>,
) -> rusqlite::Result<()> {
    conn.create_module(
        "full_scan",
        eponymous_only_module::<ScanTab>(),
        Some(ScanAux {
            registry: registry.clone(),
            quantized: false,
        }),
    )?;
    conn.create_module(
        "quantized_scan",
        eponymous_only_module::<ScanTab>(),
        Some(ScanAux {
            registry,
            quantized: true,
        }),
    )?;
    Ok(())
}

#[derive(Clone)]
struct ScanAux {
    registry: Arc<Registry>,
    quantized: bool,
}

#[repr(C)]
struct ScanTab {
    base: rusqlite::vtab::sqlite3_vtab,
    aux: ScanAux,
}

unsafe impl<'vtab> VTab<'vtab> for ScanTab {
    type Aux = ScanAux;
    type Cursor = ScanCursor;

    fn connect(
        _db: &mut VTabConnection,
        aux: Option<&ScanAux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let sql = "CREATE TABLE x(id INTEGER, distance REAL, table_name HIDDEN, column_name HIDDEN, query HIDDEN, k HIDDEN)";
        let aux = aux
            .cloned()
            .ok_or_else(|| rusqlite::Error::ModuleError("missing scan vtab aux data".into()))?;
        Ok((
            sql.to_string(),
            ScanTab {
                base: rusqlite::vtab::sqlite3_vtab::default(),
                aux,
            },
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        info.set_estimated_cost(1_000_000.0);
        Ok(())
    }

    fn open(&'vtab mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(ScanCursor::new(self.aux.clone()))
    }
}

impl CreateVTab<'_> for ScanTab {
    const KIND: VTabKind = VTabKind::EponymousOnly;
}

struct ScanCursor {
    aux: ScanAux,
    rows: Vec<(i64, f64)>,
    index: usize,
}

impl ScanCursor {
    fn new(aux: ScanAux) -> Self {
        Self {
            aux,
            rows: Vec::new(),
            index: 0,
        }
    }
}

unsafe impl VTabCursor for ScanCursor {
    fn filter(
        &mut self,
        _idx_num: c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        let table: String = args.get(0)?;
        let column: String = args.get(1)?;
        let query: Vec<u8> = args.get(2)?;
        let k: i64 = args.get(3)?;

        let entry = self
            .aux
            .registry
            .get(&table, &column)
            .map_err(to_rusqlite_error)?;
        let ctx = entry.read();
        self.rows = if self.aux.quantized {
            crate::search::quantized_scan_preloaded(&ctx, &query, k.max(0) as usize)
        } else {
            crate::search::full_scan_preloaded(&ctx, &query, k.max(0) as usize)
        }
        .map_err(to_rusqlite_error)?;
        self.index = 0;
        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.index += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.index >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, col: c_int) -> rusqlite::Result<()> {
        let Some(&(id, distance)) = self.rows.get(self.index) else {
            return Ok(());
        };
        match col {
            0 => ctx.set_result(&id),
            1 => ctx.set_result(&distance),
            _ => {}
        }
        Ok(())
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        self.rows
            .get(self.index)
            .map(|&(id, _)| id)
            .ok_or_else(|| rusqlite::Error::ModuleError("cursor past end".into()))
    }
}
