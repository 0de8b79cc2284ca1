//! # sqlitevector-core
//!
//! Host-agnostic core of a vector similarity search engine meant to be
//! embedded as a SQL extension: IEEE half-precision conversions, SIMD
//! distance kernels over three element types and three backends, 8-bit
//! linear quantization, a bounded top-k search driver, a process-wide
//! registry of initialized vector columns, and the scalar-function /
//! table-valued-operator glue that ties them together.
//!
//! The crate never opens a database file, parses SQL, or implements a
//! virtual table itself. [`host::Connection`]/[`host::Statement`] narrow
//! that surface down to prepare/step/bind/column and transaction
//! primitives; [`public`] and [`search`] are generic over them. The
//! optional `rusqlite_host` feature wires that trait onto a real SQLite
//! connection, including eponymous virtual tables for `full_scan` and
//! `quantized_scan`, but no core module depends on it.
//!
//! ## Layout
//!
//! - [`element`] / [`half_precision`] / [`metric`] — numeric primitives.
//! - [`kernels`] — scalar/SIMD128/SIMD256 distance kernels and dispatch.
//! - [`quantize`] — 8-bit linear scalar quantization.
//! - [`shadow`] — quantized shadow-table schema and batch layout.
//! - [`options`] — the `key=value` column-options grammar.
//! - [`registry`] — `TableContext`/`Registry`.
//! - [`vector_parse`] — the JSON vector literal grammar.
//! - [`topk`] — bounded top-k maintenance.
//! - [`search`] — the shared `full_scan`/`quantized_scan` filter.
//! - [`host`] — the narrow database trait (+ optional `rusqlite_host`).
//! - [`public`] — scalar-function / table-valued-operator glue.
//! - [`error`] — the unified error taxonomy.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod element;
pub mod error;
pub mod half_precision;
pub mod host;
pub mod kernels;
pub mod metric;
pub mod options;
pub mod public;
pub mod quantize;
pub mod registry;
pub mod search;
pub mod shadow;
pub mod topk;
pub mod vector_parse;

pub use element::ElementType;
pub use error::{Error, Result};
pub use metric::DistanceMetric;
pub use registry::{PrimaryKey, Registry, TableContext};
