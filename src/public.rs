//! Scalar-function and table-valued-operator glue.
//!
//! Every function here is generic over [`crate::host::Connection`] and
//! reachable from any adapter, not just [`crate::host::rusqlite_host`].
//! This is where table/column existence and BLOB-affinity checks,
//! primary-key resolution, and the two-pass quantization rewrite live —
//! `registry`/`quantize`/`search` stay narrower and host-agnostic.

use crate::element::ElementType;
use crate::error::{Error, Result};
use crate::host::{Connection, Statement};
use crate::options::VectorOptions;
use crate::quantize::{ColumnStats, QuantType, Quantizer, QuantizedSlice, ResolvedQuantType};
use crate::registry::{PrimaryKey, Registry, TableContext};
use crate::search;
use crate::shadow;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// The crate's own version, as reported by the `version()` scalar function.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// The active SIMD backend's name, as reported by the `backend()` scalar
/// function.
#[must_use]
pub fn backend_name() -> &'static str {
    crate::kernels::backend_name()
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

struct ColumnInfo {
    name: String,
    declared_type: String,
    is_primary_key: bool,
}

fn table_columns<C: Connection>(conn: &C, table: &str) -> Result<Vec<ColumnInfo>> {
    let sql = format!("PRAGMA table_info({});", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let mut out = Vec::new();
    while stmt.step()? {
        out.push(ColumnInfo {
            name: stmt.column_text(1)?.to_string(),
            declared_type: stmt.column_text(2).unwrap_or("").to_string(),
            is_primary_key: stmt.column_i64(5)? != 0,
        });
    }
    Ok(out)
}

fn check_blob_column<C: Connection>(conn: &C, table: &str, column: &str) -> Result<()> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Err(Error::SchemaError(format!("table '{table}' does not exist")));
    }
    let found = columns
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(column))
        .ok_or_else(|| {
            Error::SchemaError(format!("table '{table}' has no column '{column}'"))
        })?;
    let declared = found.declared_type.to_ascii_uppercase();
    if declared.is_empty() || declared.contains("BLOB") {
        Ok(())
    } else {
        Err(Error::SchemaError(format!(
            "column '{table}'.'{column}' has declared type '{}', expected BLOB affinity",
            found.declared_type
        )))
    }
}

/// Resolves `table`'s primary key: the implicit `rowid` unless exactly one
/// `INTEGER PRIMARY KEY` column is declared, in which case that column's
/// name is used (the rowid alias for a `WITHOUT ROWID` table's single
/// integer key).
fn detect_primary_key<C: Connection>(conn: &C, table: &str) -> Result<PrimaryKey> {
    let columns = table_columns(conn, table)?;
    let mut pk_columns = columns.iter().filter(|c| c.is_primary_key);
    match (pk_columns.next(), pk_columns.next()) {
        (Some(col), None) if col.declared_type.eq_ignore_ascii_case("INTEGER") => {
            Ok(PrimaryKey::Named(col.name.clone()))
        }
        _ => Ok(PrimaryKey::RowId),
    }
}

fn restore_quantizer<C: Connection>(
    conn: &C,
    table: &str,
    column: &str,
) -> Result<Option<Quantizer>> {
    let sql = format!(
        "SELECT key, value FROM {} WHERE tblname = '{}' AND colname = '{}';",
        shadow::METADATA_TABLE,
        escape_literal(table),
        escape_literal(column)
    );
    let mut stmt = conn.prepare(&sql)?;
    let (mut qtype, mut scale, mut offset) = (None, None, None);
    while stmt.step()? {
        match stmt.column_text(0)? {
            shadow::META_KEY_QTYPE => {
                qtype = Some(match stmt.column_i64(1)? {
                    0 => ResolvedQuantType::U8,
                    _ => ResolvedQuantType::I8,
                });
            }
            shadow::META_KEY_QSCALE => scale = Some(stmt.column_f64(1)? as f32),
            shadow::META_KEY_QOFFSET => offset = Some(stmt.column_f64(1)? as f32),
            _ => {}
        }
    }
    Ok(match (qtype, scale, offset) {
        (Some(q), Some(s), Some(o)) => Some(Quantizer::from_parts(q, s, o)),
        _ => None,
    })
}

fn persist_quantizer<C: Connection>(
    conn: &C,
    table: &str,
    column: &str,
    quantizer: Quantizer,
) -> Result<()> {
    let qtype_code: i64 = match quantizer.qtype() {
        ResolvedQuantType::U8 => 0,
        ResolvedQuantType::I8 => 1,
    };
    for (key, sql_value) in [
        (shadow::META_KEY_QTYPE, qtype_code.to_string()),
        (shadow::META_KEY_QSCALE, format!("{}", f64::from(quantizer.scale()))),
        (shadow::META_KEY_QOFFSET, format!("{}", f64::from(quantizer.offset()))),
    ] {
        let sql = format!(
            "INSERT OR REPLACE INTO {} (tblname, colname, key, value) VALUES ('{}', '{}', '{key}', {sql_value});",
            shadow::METADATA_TABLE,
            escape_literal(table),
            escape_literal(column),
        );
        conn.exec(&sql)?;
    }
    Ok(())
}

/// Registers `(table, column)`: validates schema, resolves the primary
/// key, parses `opts`, and restores any previously persisted quantizer.
///
/// # Errors
///
/// [`Error::SchemaError`] for a missing table/column or non-BLOB column;
/// [`Error::InvalidArgument`] for a malformed options string;
/// [`Error::ResourceError`] if the registry is already full;
/// [`Error::SchemaError`] for an inconsistent re-registration.
pub fn init<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
    opts: &str,
) -> Result<()> {
    check_blob_column(conn, table, column)?;
    let primary_key = detect_primary_key(conn, table)?;
    let options = VectorOptions::parse(opts)?;

    conn.exec(&shadow::metadata_table_ddl())?;
    let entry = registry.init(table, column, primary_key, options)?;

    if entry.read().quantizer.is_none() {
        if let Some(quantizer) = restore_quantizer(conn, table, column)? {
            entry.write().quantizer = Some(quantizer);
            debug!(table, column, "restored persisted quantizer metadata");
        }
    }
    debug!(table, column, "vector column initialized");
    Ok(())
}

fn batch_record_budget(max_memory: u64, dimension: u32) -> usize {
    let stride = shadow::record_size(dimension) as u64;
    ((max_memory / stride.max(1)).max(1)) as usize
}

/// Trains (or retrains) the column's quantizer from a full scan of the
/// base table and rewrites its shadow table, batched to `max_memory`.
///
/// Runs the two passes and the shadow-table rewrite inside one
/// `begin`/`commit`; any error rolls back.
///
/// # Errors
///
/// [`Error::StateError`] if `(table, column)` was never `init`ed or the
/// base table has no rows; propagates host errors for any read/write.
pub fn quantize<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
) -> Result<()> {
    let entry = registry.get(table, column)?;
    let (requested, dim, pk, element_type) = {
        let ctx = entry.read();
        (
            ctx.options.quant,
            ctx.options.dimension,
            search::pk_column_sql(&ctx),
            ctx.options.element_type,
        )
    };

    conn.begin()?;
    let result = quantize_inner(conn, table, column, &pk, dim, element_type, requested, &entry);
    match result {
        Ok(()) => {
            conn.commit()?;
            Ok(())
        }
        Err(e) => {
            let _ = conn.rollback();
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn quantize_inner<C: Connection>(
    conn: &C,
    table: &str,
    column: &str,
    pk: &str,
    dim: u32,
    element_type: ElementType,
    requested: QuantType,
    entry: &Arc<RwLock<TableContext>>,
) -> Result<()> {
    let sql = format!("SELECT {pk}, {column} FROM {table};");

    let mut stats = ColumnStats::default();
    {
        let mut stmt = conn.prepare(&sql)?;
        while stmt.step()? {
            let blob = stmt.column_blob(1)?;
            stats.observe(search::decode_element_type(element_type, blob));
        }
    }
    let quantizer = Quantizer::train(requested, &stats)?;

    conn.exec(&shadow::drop_shadow_table_sql(table, column))?;
    conn.exec(&shadow::create_shadow_table_sql(table, column))?;

    let max_memory = entry.read().options.max_memory;
    let batch_rows = batch_record_budget(max_memory, dim);
    let insert_sql = shadow::insert_batch_sql(table, column);

    let mut batch = Vec::new();
    let mut batch_min = i64::MAX;
    let mut batch_max = i64::MIN;
    let mut batch_count: i64 = 0;

    let mut stmt = conn.prepare(&sql)?;
    while stmt.step()? {
        let row_id = stmt.column_i64(0)?;
        let blob = stmt.column_blob(1)?;
        let values: Vec<f32> = search::decode_element_type(element_type, blob).collect();

        let encoded = match quantizer.qtype() {
            ResolvedQuantType::U8 => {
                let mut out = vec![0u8; values.len()];
                quantizer.encode(&values, &mut QuantizedSlice::U8(&mut out));
                out
            }
            ResolvedQuantType::I8 => {
                let mut out = vec![0i8; values.len()];
                quantizer.encode(&values, &mut QuantizedSlice::I8(&mut out));
                out.into_iter().map(|b| b as u8).collect()
            }
        };

        shadow::append_record(&mut batch, row_id, &encoded);
        batch_min = batch_min.min(row_id);
        batch_max = batch_max.max(row_id);
        batch_count += 1;

        if batch_count as usize >= batch_rows {
            flush_batch(conn, &insert_sql, batch_min, batch_max, batch_count, &batch)?;
            batch.clear();
            batch_min = i64::MAX;
            batch_max = i64::MIN;
            batch_count = 0;
        }
    }
    if batch_count > 0 {
        flush_batch(conn, &insert_sql, batch_min, batch_max, batch_count, &batch)?;
    }

    persist_quantizer(conn, table, column, quantizer)?;
    entry.write().quantizer = Some(quantizer);
    debug!(
        table,
        column,
        qtype = quantizer.qtype().name(),
        "quantizer trained and shadow table rebuilt"
    );
    Ok(())
}

fn flush_batch<C: Connection>(
    conn: &C,
    insert_sql: &str,
    min_id: i64,
    max_id: i64,
    count: i64,
    data: &[u8],
) -> Result<()> {
    let mut stmt = conn.prepare(insert_sql)?;
    stmt.bind_i64(1, min_id)?;
    stmt.bind_i64(2, max_id)?;
    stmt.bind_i64(3, count)?;
    stmt.bind_blob(4, data)?;
    stmt.step()?;
    Ok(())
}

/// Sums the on-disk size of `(table, column)`'s shadow-table batches.
///
/// # Errors
///
/// Propagates [`Error::HostError`] from the connection.
pub fn quantize_memory<C: Connection>(conn: &C, table: &str, column: &str) -> Result<i64> {
    search::memory_report(conn, table, column)
}

/// Loads `(table, column)`'s shadow store (or base table, if unquantized)
/// into its in-memory preload buffer.
///
/// # Errors
///
/// Propagates whatever [`search::preload`] returns.
pub fn quantize_preload<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
) -> Result<()> {
    search::preload(conn, registry, table, column)
}

/// Clears `(table, column)`'s preload buffer and drops its shadow table,
/// without removing the registration itself.
///
/// # Errors
///
/// Returns [`Error::StateError`] if `(table, column)` was never `init`ed.
pub fn cleanup<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
) -> Result<()> {
    registry.cleanup(table, column)?;
    conn.exec(&shadow::drop_shadow_table_sql(table, column))?;
    debug!(table, column, "column cleaned up");
    Ok(())
}

/// Converts a JSON vector literal or raw BLOB into `element_type`-encoded
/// bytes for the `as_f32`/`as_f16`/`as_bf16`/`as_u8`/`as_i8` scalar
/// functions.
///
/// # Errors
///
/// Propagates [`crate::vector_parse::parse_json_vector`]'s errors.
pub fn convert_vector(
    json: &str,
    element_type: ElementType,
    dimension: Option<u32>,
) -> Result<Vec<u8>> {
    crate::vector_parse::parse_json_vector(json, element_type, dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_record_budget_is_at_least_one_row() {
        assert_eq!(batch_record_budget(1, 128), 1);
    }

    #[test]
    fn batch_record_budget_divides_by_stride() {
        let stride = shadow::record_size(4) as u64; // 8 + 4 = 12
        assert_eq!(batch_record_budget(stride * 10, 4), 10);
    }

    #[test]
    fn quote_ident_escapes_embedded_quotes() {
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn escape_literal_doubles_single_quotes() {
        assert_eq!(escape_literal("o'brien"), "o''brien");
    }
}
