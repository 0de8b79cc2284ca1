//! Per-column vector options string: a comma-separated `key=value` list
//! parsed from the `init()` scalar function's trailing argument.
//!
//! Grammar: whitespace around keys and values is trimmed, a pair missing
//! `=` is skipped entirely rather than rejected, and an unrecognized key
//! is ignored (forwards-compatible with options added later). An
//! unrecognized *value* for a recognized key is a hard [`Error::InvalidArgument`].

use crate::element::ElementType;
use crate::error::{Error, Result};
use crate::metric::DistanceMetric;
use crate::quantize::QuantType;

/// Default cap on shadow-table batch memory when `max_memory` is absent
/// or given as `0`.
pub const DEFAULT_MAX_MEMORY: u64 = 200 * 1024 * 1024;

/// Parsed and validated vector column options.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorOptions {
    /// Stored element type (`type=...`).
    pub element_type: ElementType,
    /// Vector dimension (`dimension=...`), always positive.
    pub dimension: u32,
    /// Distance metric (`distance=...`), defaults to `L2`.
    pub distance: DistanceMetric,
    /// Whether stored vectors are pre-normalized (`normalized=...`).
    pub normalized: bool,
    /// Quantization type (`qtype=...`), defaults to `Auto`.
    pub quant: QuantType,
    /// Shadow-table batch memory budget in bytes (`max_memory=...`).
    pub max_memory: u64,
}

impl VectorOptions {
    /// Parses `input` (the options string following `dimension`/`type` in
    /// an `init()` call) against defaults, requiring `dimension` and
    /// `type` to have been supplied by the time parsing completes.
    pub fn parse(input: &str) -> Result<Self> {
        let mut element_type = None;
        let mut dimension = None;
        let mut distance = DistanceMetric::L2;
        let mut normalized = false;
        let mut quant = QuantType::Auto;
        let mut max_memory = DEFAULT_MAX_MEMORY;

        for (key, value) in parse_pairs(input) {
            match key.to_ascii_lowercase().as_str() {
                "type" => element_type = Some(ElementType::parse(value)?),
                "dimension" => {
                    let dim: i64 = value.trim().parse().map_err(|_| {
                        Error::InvalidArgument(format!(
                            "invalid vector dimension: expected a positive integer, got '{value}'"
                        ))
                    })?;
                    if dim <= 0 {
                        return Err(Error::InvalidArgument(format!(
                            "invalid vector dimension: expected a positive integer, got '{value}'"
                        )));
                    }
                    dimension = Some(dim as u32);
                }
                "normalized" => {
                    normalized = value.trim().parse::<i64>().unwrap_or(0) != 0;
                }
                "max_memory" => {
                    if let Some(n) = human_to_number(value) {
                        max_memory = n;
                    }
                }
                "qtype" => quant = QuantType::parse(value)?,
                "distance" => distance = DistanceMetric::parse(value)?,
                _ => {} // unknown keys are ignored, not rejected
            }
        }

        let element_type = element_type.ok_or_else(|| {
            Error::InvalidArgument("missing required option 'type'".into())
        })?;
        let dimension = dimension.ok_or_else(|| {
            Error::InvalidArgument("missing required option 'dimension'".into())
        })?;

        Ok(Self {
            element_type,
            dimension,
            distance,
            normalized,
            quant,
            max_memory,
        })
    }
}

/// Splits `input` into trimmed `(key, value)` pairs on top-level commas,
/// skipping any pair that lacks an `=`.
fn parse_pairs(input: &str) -> impl Iterator<Item = (&str, &str)> {
    input.split(',').filter_map(|pair| {
        let pair = pair.trim();
        if pair.is_empty() {
            return None;
        }
        let (key, value) = pair.split_once('=')?;
        let (key, value) = (key.trim(), value.trim());
        if key.is_empty() || value.is_empty() {
            return None;
        }
        Some((key, value))
    })
}

/// Parses a byte-count value, accepting an optional `KB`/`MB`/`GB` suffix
/// (case-insensitive, base-1024). Returns `None` for a malformed value or
/// an unrecognized suffix, mirroring the option parser's tolerance for
/// bad input on a best-effort option.
fn human_to_number(s: &str) -> Option<u64> {
    let s = s.trim();
    let split_at = s
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-' || c == '+' || c == 'e' || c == 'E'))
        .unwrap_or(s.len());
    let (number, suffix) = s.split_at(split_at);
    let value: f64 = number.parse().ok()?;
    if value == 0.0 {
        return None;
    }
    let suffix = suffix.trim();
    let multiplier = if suffix.is_empty() {
        1.0
    } else if suffix.eq_ignore_ascii_case("kb") {
        1024.0
    } else if suffix.eq_ignore_ascii_case("mb") {
        1024.0 * 1024.0
    } else if suffix.eq_ignore_ascii_case("gb") {
        1024.0 * 1024.0 * 1024.0
    } else {
        return None;
    };
    let bytes = value * multiplier;
    if bytes < 0.0 || bytes > u64::MAX as f64 {
        return None;
    }
    Some(bytes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_required_options() {
        let opts = VectorOptions::parse("type=float32,dimension=128").unwrap();
        assert_eq!(opts.element_type, ElementType::F32);
        assert_eq!(opts.dimension, 128);
        assert_eq!(opts.distance, DistanceMetric::L2);
        assert!(!opts.normalized);
        assert_eq!(opts.max_memory, DEFAULT_MAX_MEMORY);
    }

    #[test]
    fn missing_type_is_invalid_argument() {
        assert!(matches!(
            VectorOptions::parse("dimension=4"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn missing_dimension_is_invalid_argument() {
        assert!(matches!(
            VectorOptions::parse("type=float32"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_positive_dimension_is_rejected() {
        assert!(matches!(
            VectorOptions::parse("type=float32,dimension=0"),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            VectorOptions::parse("type=float32,dimension=-1"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn malformed_pair_is_skipped_not_rejected() {
        let opts = VectorOptions::parse("type=float32,dimension=8,garbage,distance=cosine").unwrap();
        assert_eq!(opts.distance, DistanceMetric::Cosine);
    }

    #[test]
    fn unknown_key_is_ignored() {
        let opts = VectorOptions::parse("type=float32,dimension=8,totally_unknown=123").unwrap();
        assert_eq!(opts.dimension, 8);
    }

    #[test]
    fn whitespace_around_keys_and_values_is_trimmed() {
        let opts = VectorOptions::parse(" type = float32 , dimension = 16 ").unwrap();
        assert_eq!(opts.dimension, 16);
    }

    #[test]
    fn max_memory_suffixes_are_parsed() {
        let opts = VectorOptions::parse("type=float32,dimension=4,max_memory=2MB").unwrap();
        assert_eq!(opts.max_memory, 2 * 1024 * 1024);
    }

    #[test]
    fn max_memory_without_suffix_is_bytes() {
        let opts = VectorOptions::parse("type=float32,dimension=4,max_memory=4096").unwrap();
        assert_eq!(opts.max_memory, 4096);
    }

    #[test]
    fn invalid_max_memory_falls_back_to_default() {
        let opts = VectorOptions::parse("type=float32,dimension=4,max_memory=notanumber").unwrap();
        assert_eq!(opts.max_memory, DEFAULT_MAX_MEMORY);
    }

    #[test]
    fn invalid_quant_type_is_rejected() {
        assert!(matches!(
            VectorOptions::parse("type=float32,dimension=4,qtype=nonsense"),
            Err(Error::InvalidArgument(_))
        ));
    }
}
