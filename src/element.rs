//! Vector element types and their on-disk sizes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Numeric representation of a stored vector's elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    /// IEEE 754 single precision (4 bytes/element).
    F32,
    /// IEEE 754 half precision (2 bytes/element).
    F16,
    /// Brain float16: upper 16 bits of f32 (2 bytes/element).
    BF16,
    /// Unsigned 8-bit (1 byte/element), used by the quantized shadow store.
    U8,
    /// Signed 8-bit (1 byte/element), used by the quantized shadow store.
    I8,
}

impl ElementType {
    /// Size in bytes of a single element of this type.
    #[must_use]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::F32 | Self::F16 | Self::BF16 => match self {
                Self::F32 => 4,
                _ => 2,
            },
            Self::U8 | Self::I8 => 1,
        }
    }

    /// Parses the `type` option value (`FLOAT32`, `FLOAT16`, `FLOATB16`,
    /// `UINT8`, `INT8`), case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "FLOAT32" => Ok(Self::F32),
            "FLOAT16" => Ok(Self::F16),
            "FLOATB16" => Ok(Self::BF16),
            "UINT8" => Ok(Self::U8),
            "INT8" => Ok(Self::I8),
            other => Err(Error::InvalidArgument(format!(
                "unrecognized element type '{other}'"
            ))),
        }
    }

    /// Canonical option-string name for this type.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::F32 => "FLOAT32",
            Self::F16 => "FLOAT16",
            Self::BF16 => "FLOATB16",
            Self::U8 => "UINT8",
            Self::I8 => "INT8",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_sizes() {
        assert_eq!(ElementType::F32.byte_size(), 4);
        assert_eq!(ElementType::F16.byte_size(), 2);
        assert_eq!(ElementType::BF16.byte_size(), 2);
        assert_eq!(ElementType::U8.byte_size(), 1);
        assert_eq!(ElementType::I8.byte_size(), 1);
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(ElementType::parse("float32").unwrap(), ElementType::F32);
        assert_eq!(ElementType::parse("UiNt8").unwrap(), ElementType::U8);
        assert!(ElementType::parse("bogus").is_err());
    }

    #[test]
    fn round_trips_through_name() {
        for t in [
            ElementType::F32,
            ElementType::F16,
            ElementType::BF16,
            ElementType::U8,
            ElementType::I8,
        ] {
            assert_eq!(ElementType::parse(t.name()).unwrap(), t);
        }
    }
}
