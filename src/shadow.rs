//! Shadow-table schema and batch record layout for quantized storage.
//!
//! Quantized vectors live in a side table named `vector0_<table>_<column>`
//! rather than inline in the base table, batched into BLOB rows so a scan
//! reads a handful of large BLOBs instead of one row per vector. Each
//! batch row is `(rowid1, rowid2, counter, data)`: `rowid1`/`rowid2` are
//! the inclusive min/max source row id in the batch (informational, used
//! for pruning in range-restricted scans), `counter` is the number of
//! vectors packed into `data`, and `data` is `counter` concatenated
//! records of `rowid: i64 little-endian` followed by `dimension` quantized
//! bytes.
//!
//! Per-column metadata (quantization type/scale/offset) lives in a single
//! shared `_sqliteai_vector` table keyed by `(table, column, key)`.

/// Name of the shared per-column metadata table.
pub const METADATA_TABLE: &str = "_sqliteai_vector";

/// `key` used to persist the resolved [`crate::quantize::ResolvedQuantType`].
pub const META_KEY_QTYPE: &str = "qtype";
/// `key` used to persist the fitted quantizer scale.
pub const META_KEY_QSCALE: &str = "qscale";
/// `key` used to persist the fitted quantizer offset.
pub const META_KEY_QOFFSET: &str = "qoffset";

/// DDL to create the shared metadata table if it does not already exist.
#[must_use]
pub fn metadata_table_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {METADATA_TABLE} (tblname TEXT, colname TEXT, key TEXT, value ANY, PRIMARY KEY(tblname, colname, key));"
    )
}

/// Name of the shadow table backing `(table, column)`'s quantized storage.
#[must_use]
pub fn shadow_table_name(table: &str, column: &str) -> String {
    format!("vector0_{table}_{column}")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// DDL to create the shadow table for `(table, column)` if absent.
#[must_use]
pub fn create_shadow_table_sql(table: &str, column: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (rowid1 INTEGER, rowid2 INTEGER, counter INTEGER, data BLOB);",
        quote_ident(&shadow_table_name(table, column))
    )
}

/// DDL to drop the shadow table for `(table, column)`.
#[must_use]
pub fn drop_shadow_table_sql(table: &str, column: &str) -> String {
    format!(
        "DROP TABLE IF EXISTS {};",
        quote_ident(&shadow_table_name(table, column))
    )
}

/// Statement text to read every batch row back, in insertion order.
#[must_use]
pub fn select_batches_sql(table: &str, column: &str) -> String {
    format!(
        "SELECT counter, data FROM {};",
        quote_ident(&shadow_table_name(table, column))
    )
}

/// Statement text to sum the on-disk size of every batch's `data` blob.
#[must_use]
pub fn select_memory_sql(table: &str, column: &str) -> String {
    format!(
        "SELECT SUM(LENGTH(data)) FROM {};",
        quote_ident(&shadow_table_name(table, column))
    )
}

/// Statement text to append one batch row.
#[must_use]
pub fn insert_batch_sql(table: &str, column: &str) -> String {
    format!(
        "INSERT INTO {} (rowid1, rowid2, counter, data) VALUES (?, ?, ?, ?);",
        quote_ident(&shadow_table_name(table, column))
    )
}

/// Byte size of one packed record: an 8-byte little-endian row id
/// followed by `dimension` quantized element bytes.
#[must_use]
pub fn record_size(dimension: u32) -> usize {
    std::mem::size_of::<i64>() + dimension as usize
}

/// Appends one `(row_id, quantized_bytes)` record to a batch buffer.
///
/// # Panics
///
/// Panics if `quantized.len()` doesn't match the dimension the caller is
/// packing records for (a caller bug, not a data error, since the caller
/// controls both).
pub fn append_record(buf: &mut Vec<u8>, row_id: i64, quantized: &[u8]) {
    buf.extend_from_slice(&row_id.to_le_bytes());
    buf.extend_from_slice(quantized);
}

/// One decoded record from a batch's `data` blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    /// Source row id.
    pub row_id: i64,
    /// Quantized element bytes, `dimension` bytes long.
    pub data: &'a [u8],
}

/// Iterates the packed records in a batch's `data` blob.
///
/// # Errors
///
/// Returns [`crate::error::Error::FormatError`] if `data`'s length is not
/// an exact multiple of `record_size(dimension)`.
pub fn iter_records(
    data: &[u8],
    dimension: u32,
) -> crate::error::Result<impl Iterator<Item = Record<'_>>> {
    let stride = record_size(dimension);
    if stride == 0 || data.len() % stride != 0 {
        return Err(crate::error::Error::FormatError(format!(
            "shadow batch of {} bytes is not a multiple of the {stride}-byte record stride",
            data.len()
        )));
    }
    Ok(data.chunks_exact(stride).map(move |chunk| {
        let (row_id_bytes, rest) = chunk.split_at(std::mem::size_of::<i64>());
        Record {
            row_id: i64::from_le_bytes(row_id_bytes.try_into().unwrap()),
            data: rest,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_table_name_is_namespaced() {
        assert_eq!(shadow_table_name("docs", "embedding"), "vector0_docs_embedding");
    }

    #[test]
    fn record_round_trips_through_buffer() {
        let dim = 4u32;
        let mut buf = Vec::new();
        append_record(&mut buf, 42, &[1, 2, 3, 4]);
        append_record(&mut buf, 43, &[5, 6, 7, 8]);

        let records: Vec<Record> = iter_records(&buf, dim).unwrap().collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].row_id, 42);
        assert_eq!(records[0].data, &[1, 2, 3, 4]);
        assert_eq!(records[1].row_id, 43);
        assert_eq!(records[1].data, &[5, 6, 7, 8]);
    }

    #[test]
    fn malformed_batch_length_is_format_error() {
        let buf = vec![0u8; 10]; // not a multiple of record_size(4) == 12
        assert!(iter_records(&buf, 4).is_err());
    }

    #[test]
    fn ddl_quotes_identifiers_with_embedded_quotes() {
        let sql = create_shadow_table_sql("weird\"table", "col");
        assert!(sql.contains("\"\""));
    }
}
