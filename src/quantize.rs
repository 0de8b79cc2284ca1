//! 8-bit linear scalar quantization.
//!
//! A single `(scale, offset)` pair is fit per column from a full scan of
//! its vectors (not per-dimension, unlike some ANN quantizers) and reused
//! for every row and for query vectors at search time. `Auto` picks `I8`
//! the moment any element is negative and `U8` otherwise, mirroring the
//! training pass the dispatcher this module is grounded on performs
//! before it ever writes a shadow row.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Requested quantization type, as accepted by the `quantize` options
/// string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantType {
    /// Choose `I8` if the column contains a negative element, else `U8`.
    Auto,
    /// Asymmetric unsigned 8-bit, range `[0, 255]`.
    U8,
    /// Symmetric signed 8-bit, range `[-128, 127]`.
    I8,
}

impl QuantType {
    /// Parses the `quant` option value (`UINT8` / `INT8` / `AUTO`).
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AUTO" => Ok(Self::Auto),
            "UINT8" => Ok(Self::U8),
            "INT8" => Ok(Self::I8),
            other => Err(Error::InvalidArgument(format!(
                "unrecognized quantization type '{other}'"
            ))),
        }
    }

    /// Canonical name, used for persistence and error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Auto => "AUTO",
            Self::U8 => "UINT8",
            Self::I8 => "INT8",
        }
    }
}

/// Resolved quantization type: `Auto` never survives past [`Quantizer::train`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolvedQuantType {
    /// Asymmetric unsigned 8-bit.
    U8,
    /// Symmetric signed 8-bit.
    I8,
}

impl ResolvedQuantType {
    /// Canonical name, matching [`QuantType::name`] for the two concrete
    /// variants.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U8 => "UINT8",
            Self::I8 => "INT8",
        }
    }
}

/// Running min/max/negative-presence statistics collected during the
/// first pass over a column's vectors.
#[derive(Debug, Clone, Copy)]
pub struct ColumnStats {
    min: f32,
    max: f32,
    has_negative: bool,
    seen: bool,
}

impl Default for ColumnStats {
    fn default() -> Self {
        Self {
            min: f32::MAX,
            max: f32::MIN,
            has_negative: false,
            seen: false,
        }
    }
}

impl ColumnStats {
    /// Folds a single vector's elements into the running statistics.
    pub fn observe(&mut self, values: impl IntoIterator<Item = f32>) {
        for v in values {
            self.seen = true;
            if v < self.min {
                self.min = v;
            }
            if v > self.max {
                self.max = v;
            }
            if v < 0.0 {
                self.has_negative = true;
            }
        }
    }

    /// `true` if at least one element has been observed.
    #[must_use]
    pub const fn has_data(&self) -> bool {
        self.seen
    }
}

/// A trained `(scale, offset)` quantizer for one column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quantizer {
    qtype: ResolvedQuantType,
    scale: f32,
    offset: f32,
}

impl Quantizer {
    /// Resolves `requested` against the collected statistics and fits the
    /// `(scale, offset)` pair for them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StateError`] if no vectors were observed.
    pub fn train(requested: QuantType, stats: &ColumnStats) -> Result<Self> {
        if !stats.has_data() {
            return Err(Error::StateError(
                "cannot train a quantizer with no observed vectors".into(),
            ));
        }
        let qtype = match requested {
            QuantType::Auto if stats.has_negative => ResolvedQuantType::I8,
            QuantType::Auto => ResolvedQuantType::U8,
            QuantType::U8 => ResolvedQuantType::U8,
            QuantType::I8 => ResolvedQuantType::I8,
        };
        let (scale, offset) = match qtype {
            ResolvedQuantType::U8 => {
                let range = stats.max - stats.min;
                let scale = if range == 0.0 { 1.0 } else { 255.0 / range };
                (scale, stats.min)
            }
            ResolvedQuantType::I8 => {
                let abs_max = stats.min.abs().max(stats.max.abs());
                let scale = if abs_max == 0.0 { 1.0 } else { 127.0 / abs_max };
                (scale, 0.0)
            }
        };
        Ok(Self {
            qtype,
            scale,
            offset,
        })
    }

    /// The resolved quantization type.
    #[must_use]
    pub const fn qtype(self) -> ResolvedQuantType {
        self.qtype
    }

    /// Fitted scale, stored alongside `offset` in the metadata table.
    #[must_use]
    pub const fn scale(self) -> f32 {
        self.scale
    }

    /// Fitted offset, stored alongside `scale` in the metadata table.
    #[must_use]
    pub const fn offset(self) -> f32 {
        self.offset
    }

    /// Reconstructs a quantizer from persisted `(qtype, scale, offset)`
    /// metadata-table values.
    #[must_use]
    pub const fn from_parts(qtype: ResolvedQuantType, scale: f32, offset: f32) -> Self {
        Self {
            qtype,
            scale,
            offset,
        }
    }

    /// Encodes `values` into `out`, which must have matching length.
    ///
    /// # Panics
    ///
    /// Panics if `values.len() != out.len()`.
    pub fn encode(self, values: &[f32], out: &mut QuantizedSlice<'_>) {
        assert_eq!(values.len(), out.len());
        match (self.qtype, out) {
            (ResolvedQuantType::U8, QuantizedSlice::U8(dst)) => {
                for (v, d) in values.iter().zip(dst.iter_mut()) {
                    *d = self.encode_u8(*v);
                }
            }
            (ResolvedQuantType::I8, QuantizedSlice::I8(dst)) => {
                for (v, d) in values.iter().zip(dst.iter_mut()) {
                    *d = self.encode_i8(*v);
                }
            }
            _ => panic!("quantizer type does not match destination slice type"),
        }
    }

    /// Encodes a single element to `u8`, rounding half away from zero and
    /// clamping to `[0, 255]`.
    #[inline]
    #[must_use]
    pub fn encode_u8(self, value: f32) -> u8 {
        let scaled = (value - self.offset) * self.scale;
        round_half_away_from_zero(scaled).clamp(0.0, 255.0) as u8
    }

    /// Encodes a single element to `i8`, rounding half away from zero and
    /// clamping to `[-128, 127]`.
    #[inline]
    #[must_use]
    pub fn encode_i8(self, value: f32) -> i8 {
        let scaled = (value - self.offset) * self.scale;
        round_half_away_from_zero(scaled).clamp(-128.0, 127.0) as i8
    }

    /// Dequantizes a single `u8` element back to `f32`.
    #[inline]
    #[must_use]
    pub fn decode_u8(self, value: u8) -> f32 {
        f32::from(value) / self.scale + self.offset
    }

    /// Dequantizes a single `i8` element back to `f32`.
    #[inline]
    #[must_use]
    pub fn decode_i8(self, value: i8) -> f32 {
        f32::from(value) / self.scale + self.offset
    }
}

/// Rounds half away from zero: `round_half_away_from_zero(0.5) == 1.0`,
/// `round_half_away_from_zero(-0.5) == -1.0`. Rust's own `f32::round`
/// already rounds this way, but the explicit form documents the
/// behavior this module depends on (Rust's round-to-even is *not* what
/// the quantizer needs).
#[inline]
fn round_half_away_from_zero(x: f32) -> f32 {
    x.round()
}

/// A typed destination buffer for [`Quantizer::encode`], avoiding a
/// separate encode function per element type at call sites that are
/// themselves generic over quantization type.
pub enum QuantizedSlice<'a> {
    /// Destination for `ResolvedQuantType::U8`.
    U8(&'a mut [u8]),
    /// Destination for `ResolvedQuantType::I8`.
    I8(&'a mut [i8]),
}

impl QuantizedSlice<'_> {
    fn len(&self) -> usize {
        match self {
            Self::U8(s) => s.len(),
            Self::I8(s) => s.len(),
        }
    }
}
