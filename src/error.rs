//! Error types for the vector search core.
//!
//! Mirrors the error taxonomy of the host-agnostic core: every public
//! operation fails with one of these variants, never a bare string.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the core to its caller (scalar function, table-valued
/// operator, or direct library use).
#[derive(Error, Debug)]
pub enum Error {
    /// Wrong arity, wrong value type, unknown enum name, or a dimension
    /// mismatch between a declared column and a supplied vector.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing table/column, non-BLOB column, or a without-rowid table
    /// lacking a single INTEGER primary key.
    #[error("schema error: {0}")]
    SchemaError(String),

    /// An operation required a prior `init`/`quantize` that was never run.
    #[error("state error: {0}")]
    StateError(String),

    /// Out of memory, or registry capacity exceeded.
    #[error("resource error: {0}")]
    ResourceError(String),

    /// Malformed JSON vector literal, out-of-range numeric element, or a
    /// BLOB whose length is not a multiple of the element size.
    #[error("format error: {0}")]
    FormatError(String),

    /// An error surfaced by the host database, propagated unchanged.
    #[error("host error: {0}")]
    HostError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Short machine-readable tag for the error category, useful when a
    /// host wants to map errors onto its own native error codes.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::SchemaError(_) => "SCHEMA_ERROR",
            Self::StateError(_) => "STATE_ERROR",
            Self::ResourceError(_) => "RESOURCE_ERROR",
            Self::FormatError(_) => "FORMAT_ERROR",
            Self::HostError(_) => "HOST_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_matches_variant() {
        assert_eq!(
            Error::InvalidArgument("x".into()).category(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(Error::StateError("x".into()).category(), "STATE_ERROR");
    }
}
