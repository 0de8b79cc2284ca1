//! The shared scan driver behind `full_scan` and `quantized_scan`.
//!
//! Both table-valued operators share the same argument contract (table,
//! column, query vector, `k`) and the same [`TopK`] accumulation
//! discipline; they differ only in where candidate vectors come from and
//! which element type the distance kernel sees. `full_scan` reads the
//! base table's native column through the host connection; `quantized_scan`
//! requires a trained quantizer and reads the shadow table (or, if
//! populated, the in-memory preload buffer) as quantized bytes, quantizing
//! the query vector once up front with the same `(scale, offset)`.

use crate::element::ElementType;
use crate::error::{Error, Result};
use crate::host::{Connection, Statement};
use crate::kernels;
use crate::registry::{Registry, TableContext};
use crate::shadow;
use crate::topk::TopK;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Converts a raw element-typed byte slice into the distance for one
/// candidate against `query`, both read as `element_type`.
///
/// BLOB bytes handed back by the host are not guaranteed to be aligned
/// for `f32`/`u16`, so every multi-byte element type is decoded
/// little-endian into an owned buffer rather than reinterpret-cast.
fn distance_bytes(ctx: &TableContext, query: &[u8], candidate: &[u8]) -> f32 {
    let metric = ctx.options.distance;
    match ctx.options.element_type {
        ElementType::F32 => {
            kernels::distance_f32(metric, &decode_f32(query), &decode_f32(candidate))
        }
        ElementType::F16 => {
            kernels::distance_f16(metric, &decode_u16(query), &decode_u16(candidate))
        }
        ElementType::BF16 => {
            kernels::distance_bf16(metric, &decode_u16(query), &decode_u16(candidate))
        }
        ElementType::U8 => kernels::distance_u8(metric, query, candidate),
        ElementType::I8 => kernels::distance_i8(metric, &cast_i8(query), &cast_i8(candidate)),
    }
}

fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn decode_u16(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// `i8` has the same alignment as `u8`, so this reinterpretation is
/// always sound (unlike the wider element types above).
fn cast_i8(bytes: &[u8]) -> Vec<i8> {
    bytes.iter().map(|&b| b as i8).collect()
}

pub(crate) fn pk_column_sql(ctx: &TableContext) -> String {
    match &ctx.primary_key {
        crate::registry::PrimaryKey::RowId => "rowid".to_string(),
        crate::registry::PrimaryKey::Named(name) => name.clone(),
    }
}

fn validate_query_len(ctx: &TableContext, query: &[u8]) -> Result<()> {
    let expected = ctx.options.dimension as usize * ctx.options.element_type.byte_size();
    if query.len() != expected {
        return Err(Error::InvalidArgument(format!(
            "query vector is {} bytes, expected {expected} for dimension {} of type {}",
            query.len(),
            ctx.options.dimension,
            ctx.options.element_type.name()
        )));
    }
    Ok(())
}

/// Performs an exact k-NN scan over the base table's native column.
///
/// # Errors
///
/// Returns [`Error::StateError`] if `(table, column)` was never
/// registered, [`Error::InvalidArgument`] if the query vector's byte
/// length doesn't match the registered dimension/type, and propagates
/// any [`Error::HostError`] from the connection.
pub fn full_scan<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
    query: &[u8],
    k: usize,
) -> Result<Vec<(i64, f64)>> {
    let entry = registry.get(table, column)?;
    let ctx = entry.read();
    validate_query_len(&ctx, query)?;

    if k == 0 {
        return Ok(Vec::new());
    }

    let mut top = TopK::new(k);
    let elem_size = ctx.options.element_type.byte_size();
    let expected_len = ctx.options.dimension as usize * elem_size;

    if !ctx.preloaded.is_empty() {
        for (row_id, bytes) in &ctx.preloaded {
            let d = distance_bytes(&ctx, query, bytes);
            top.offer(*row_id, f64::from(d));
        }
        debug!(table, column, "full_scan served from preload buffer");
        return Ok(top.finish());
    }

    let pk = pk_column_sql(&ctx);
    let sql = format!("SELECT {pk}, {column} FROM {table};");
    let mut stmt = conn.prepare(&sql)?;
    while stmt.step()? {
        let row_id = stmt.column_i64(0)?;
        let blob = stmt.column_blob(1)?;
        if blob.len() != expected_len {
            return Err(Error::SchemaError(format!(
                "row {row_id} has a {}-byte vector, expected {expected_len}",
                blob.len()
            )));
        }
        let d = distance_bytes(&ctx, query, blob);
        top.offer(row_id, f64::from(d));
    }
    debug!(table, column, "full_scan completed from base table");
    Ok(top.finish())
}

/// Performs an approximate k-NN scan over the quantized shadow store.
///
/// # Errors
///
/// Returns [`Error::StateError`] if `(table, column)` was never
/// registered or has no trained quantizer yet, [`Error::InvalidArgument`]
/// for a mis-sized query vector, and propagates host/format errors
/// encountered while reading shadow batches.
pub fn quantized_scan<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
    query: &[u8],
    k: usize,
) -> Result<Vec<(i64, f64)>> {
    let entry = registry.get(table, column)?;
    let ctx = entry.read();
    validate_query_len(&ctx, query)?;

    let quantizer = ctx.quantizer.ok_or_else(|| {
        Error::StateError(format!(
            "column '{table}'.'{column}' has no trained quantizer; call quantize() first"
        ))
    })?;

    if k == 0 {
        return Ok(Vec::new());
    }

    let query_f32 = to_f32_query(&ctx, query);
    let dim = ctx.options.dimension as usize;
    let quantized_query: Vec<u8> = match quantizer.qtype() {
        crate::quantize::ResolvedQuantType::U8 => query_f32
            .iter()
            .map(|&v| quantizer.encode_u8(v))
            .collect(),
        crate::quantize::ResolvedQuantType::I8 => query_f32
            .iter()
            .map(|&v| quantizer.encode_i8(v) as u8)
            .collect(),
    };

    let metric = ctx.options.distance;
    let mut top = TopK::new(k);

    if !ctx.preloaded.is_empty() {
        for (row_id, bytes) in &ctx.preloaded {
            let d = quantized_distance(metric, quantizer.qtype(), &quantized_query, bytes);
            top.offer(*row_id, f64::from(d));
        }
        debug!(table, column, "quantized_scan served from preload buffer");
        return Ok(top.finish());
    }

    let sql = shadow::select_batches_sql(table, column);
    let mut stmt = conn.prepare(&sql)?;
    while stmt.step()? {
        let counter = stmt.column_i64(0)?;
        let data = stmt.column_blob(1)?;
        let records = shadow::iter_records(data, dim as u32)?;
        let mut seen = 0i64;
        for record in records {
            let d = quantized_distance(metric, quantizer.qtype(), &quantized_query, record.data);
            top.offer(record.row_id, f64::from(d));
            seen += 1;
        }
        debug_assert_eq!(seen, counter);
    }
    debug!(table, column, "quantized_scan completed from shadow table");
    Ok(top.finish())
}

fn to_f32_query(ctx: &TableContext, query: &[u8]) -> Vec<f32> {
    decode_element_type(ctx.options.element_type, query).collect()
}

/// Decodes `bytes` (a single `element_type`-encoded vector) into owned
/// `f32` values, upconverting `F16`/`BF16` and widening `U8`/`I8`.
///
/// Shared by the quantizer's two scanning passes (which need per-element
/// `f32` values regardless of storage type) and this module's own
/// query-vector decoding.
pub fn decode_element_type(element_type: ElementType, bytes: &[u8]) -> std::vec::IntoIter<f32> {
    match element_type {
        ElementType::F32 => decode_f32(bytes).into_iter(),
        ElementType::F16 => decode_u16(bytes)
            .into_iter()
            .map(crate::half_precision::f16_to_f32)
            .collect::<Vec<_>>()
            .into_iter(),
        ElementType::BF16 => decode_u16(bytes)
            .into_iter()
            .map(crate::half_precision::bf16_to_f32)
            .collect::<Vec<_>>()
            .into_iter(),
        ElementType::U8 => bytes
            .iter()
            .map(|&b| f32::from(b))
            .collect::<Vec<_>>()
            .into_iter(),
        ElementType::I8 => cast_i8(bytes)
            .into_iter()
            .map(f32::from)
            .collect::<Vec<_>>()
            .into_iter(),
    }
}

fn quantized_distance(
    metric: crate::metric::DistanceMetric,
    qtype: crate::quantize::ResolvedQuantType,
    query: &[u8],
    candidate: &[u8],
) -> f32 {
    match qtype {
        crate::quantize::ResolvedQuantType::U8 => kernels::distance_u8(metric, query, candidate),
        crate::quantize::ResolvedQuantType::I8 => {
            kernels::distance_i8(metric, &cast_i8(query), &cast_i8(candidate))
        }
    }
}

/// Performs a [`full_scan`]-equivalent scan using only the in-memory
/// preload buffer, for callers (such as a virtual-table cursor) that
/// have a [`TableContext`] in hand but no [`Connection`].
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for a mis-sized query vector, or
/// [`Error::StateError`] if the column has never been preloaded.
pub fn full_scan_preloaded(ctx: &TableContext, query: &[u8], k: usize) -> Result<Vec<(i64, f64)>> {
    validate_query_len(ctx, query)?;
    if ctx.preloaded.is_empty() {
        return Err(Error::StateError(
            "column has not been preloaded; call preload() first".to_string(),
        ));
    }
    if k == 0 {
        return Ok(Vec::new());
    }
    let mut top = TopK::new(k);
    for (row_id, bytes) in &ctx.preloaded {
        let d = distance_bytes(ctx, query, bytes);
        top.offer(*row_id, f64::from(d));
    }
    Ok(top.finish())
}

/// Performs a [`quantized_scan`]-equivalent scan using only the in-memory
/// preload buffer, for callers (such as a virtual-table cursor) that
/// have a [`TableContext`] in hand but no [`Connection`].
///
/// # Errors
///
/// Returns [`Error::StateError`] if the column has no trained quantizer or
/// has never been preloaded, or [`Error::InvalidArgument`] for a
/// mis-sized query vector.
pub fn quantized_scan_preloaded(
    ctx: &TableContext,
    query: &[u8],
    k: usize,
) -> Result<Vec<(i64, f64)>> {
    validate_query_len(ctx, query)?;
    let quantizer = ctx.quantizer.ok_or_else(|| {
        Error::StateError("column has no trained quantizer; call quantize() first".to_string())
    })?;
    if ctx.preloaded.is_empty() {
        return Err(Error::StateError(
            "column has not been preloaded; call preload() first".to_string(),
        ));
    }
    if k == 0 {
        return Ok(Vec::new());
    }

    let query_f32 = to_f32_query(ctx, query);
    let quantized_query: Vec<u8> = match quantizer.qtype() {
        crate::quantize::ResolvedQuantType::U8 => {
            query_f32.iter().map(|&v| quantizer.encode_u8(v)).collect()
        }
        crate::quantize::ResolvedQuantType::I8 => query_f32
            .iter()
            .map(|&v| quantizer.encode_i8(v) as u8)
            .collect(),
    };

    let metric = ctx.options.distance;
    let mut top = TopK::new(k);
    for (row_id, bytes) in &ctx.preloaded {
        let d = quantized_distance(metric, quantizer.qtype(), &quantized_query, bytes);
        top.offer(*row_id, f64::from(d));
    }
    Ok(top.finish())
}

/// Sums the on-disk size of a column's shadow-table batches, for the
/// `quantize_memory` diagnostic scalar function.
///
/// # Errors
///
/// Propagates [`Error::HostError`] from the connection.
pub fn memory_report<C: Connection>(conn: &C, table: &str, column: &str) -> Result<i64> {
    let sql = shadow::select_memory_sql(table, column);
    Ok(conn.exec_scalar_int64(&sql)?.unwrap_or(0))
}

/// Loads every row of `(table, column)` into the registry's in-memory
/// preload buffer, so subsequent scans skip the host round trip.
///
/// Loads from the shadow table when a quantizer is trained (serving
/// `quantized_scan`), otherwise from the base table (serving `full_scan`).
///
/// # Errors
///
/// Returns [`Error::StateError`] if `(table, column)` was never
/// registered, and propagates host/format errors encountered while
/// reading rows.
pub fn preload<C: Connection>(
    conn: &C,
    registry: &Registry,
    table: &str,
    column: &str,
) -> Result<()> {
    let entry = registry.get(table, column)?;
    let loaded = {
        let ctx = entry.read();
        if ctx.quantizer.is_some() {
            preload_from_shadow(conn, table, column, &ctx)?
        } else {
            preload_from_base(conn, table, column, &ctx)?
        }
    };
    let count = loaded.len();
    entry_set_preloaded(&entry, loaded);
    debug!(table, column, rows = count, "preload populated");
    Ok(())
}

fn entry_set_preloaded(entry: &Arc<RwLock<TableContext>>, loaded: Vec<(i64, Vec<u8>)>) {
    entry.write().preloaded = loaded;
}

fn preload_from_base<C: Connection>(
    conn: &C,
    table: &str,
    column: &str,
    ctx: &TableContext,
) -> Result<Vec<(i64, Vec<u8>)>> {
    let pk = pk_column_sql(ctx);
    let sql = format!("SELECT {pk}, {column} FROM {table};");
    let mut stmt = conn.prepare(&sql)?;
    let mut out = Vec::new();
    while stmt.step()? {
        let row_id = stmt.column_i64(0)?;
        let blob = stmt.column_blob(1)?.to_vec();
        out.push((row_id, blob));
    }
    Ok(out)
}

fn preload_from_shadow<C: Connection>(
    conn: &C,
    table: &str,
    column: &str,
    ctx: &TableContext,
) -> Result<Vec<(i64, Vec<u8>)>> {
    let dim = ctx.options.dimension;
    let sql = shadow::select_batches_sql(table, column);
    let mut stmt = conn.prepare(&sql)?;
    let mut out = Vec::new();
    while stmt.step()? {
        let data = stmt.column_blob(1)?;
        for record in shadow::iter_records(data, dim)? {
            out.push((record.row_id, record.data.to_vec()));
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::VectorOptions;
    use crate::quantize::QuantType;
    use crate::registry::PrimaryKey;

    fn test_ctx(dim: u32) -> TableContext {
        let reg = Registry::new();
        reg.init(
            "t",
            "v",
            PrimaryKey::RowId,
            VectorOptions {
                element_type: ElementType::F32,
                dimension: dim,
                distance: crate::metric::DistanceMetric::L2,
                normalized: false,
                quant: QuantType::Auto,
                max_memory: 1024,
            },
        )
        .unwrap();
        Arc::try_unwrap(reg.get("t", "v").unwrap())
            .unwrap_or_else(|_| panic!("unexpected extra Arc reference"))
            .into_inner()
    }

    #[test]
    fn validate_query_len_rejects_mismatched_size() {
        let ctx = test_ctx(4);
        let bad = vec![0u8; 8]; // 2 f32 elements, not 4
        assert!(matches!(
            validate_query_len(&ctx, &bad),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn validate_query_len_accepts_matching_size() {
        let ctx = test_ctx(4);
        let ok = vec![0u8; 16]; // 4 f32 elements
        assert!(validate_query_len(&ctx, &ok).is_ok());
    }

    #[test]
    fn distance_bytes_matches_f32_kernel_for_f32_column() {
        let ctx = test_ctx(4);
        let a: [f32; 4] = [1.0, 0.0, 0.0, 0.0];
        let b: [f32; 4] = [0.0, 1.0, 0.0, 0.0];
        let a_bytes: Vec<u8> = a.iter().flat_map(|v| v.to_le_bytes()).collect();
        let b_bytes: Vec<u8> = b.iter().flat_map(|v| v.to_le_bytes()).collect();
        let got = distance_bytes(&ctx, &a_bytes, &b_bytes);
        let want = kernels::distance_f32(crate::metric::DistanceMetric::L2, &a, &b);
        assert!((got - want).abs() < 1e-6);
    }
}
