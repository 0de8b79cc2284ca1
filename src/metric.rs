//! Distance metrics for k-NN search.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Distance metric selecting which kernel family to dispatch through.
///
/// Every metric is oriented so that **smaller means more similar**: `Dot`
/// and `Cosine` are negated/subtracted accordingly, unlike a typical
/// similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// `sqrt(sum((a_i - b_i)^2))`.
    L2,
    /// `sum((a_i - b_i)^2)`, avoids the square root.
    SquaredL2,
    /// `sum(|a_i - b_i|)`.
    L1,
    /// `-sum(a_i * b_i)`.
    Dot,
    /// `1 - dot(a, b) / (||a|| * ||b||)`; `1.0` when either norm is zero.
    Cosine,
}

impl DistanceMetric {
    /// Parses the `distance` option value, accepting the documented aliases
    /// (`L2`/`EUCLIDEAN`, `DOT`/`INNER`, `L1`/`MANHATTAN`).
    pub fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_uppercase().as_str() {
            "L2" | "EUCLIDEAN" => Ok(Self::L2),
            "SQUARED_L2" => Ok(Self::SquaredL2),
            "COSINE" => Ok(Self::Cosine),
            "DOT" | "INNER" => Ok(Self::Dot),
            "L1" | "MANHATTAN" => Ok(Self::L1),
            other => Err(Error::InvalidArgument(format!(
                "unrecognized distance metric '{other}'"
            ))),
        }
    }

    /// Canonical name used as a dispatch-table index / error message.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::SquaredL2 => "SQUARED_L2",
            Self::L1 => "L1",
            Self::Dot => "DOT",
            Self::Cosine => "COSINE",
        }
    }

    /// All five metrics, used to populate the dispatch table at init.
    pub const ALL: [Self; 5] = [
        Self::L2,
        Self::SquaredL2,
        Self::L1,
        Self::Dot,
        Self::Cosine,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_same_metric() {
        assert_eq!(DistanceMetric::parse("l2").unwrap(), DistanceMetric::L2);
        assert_eq!(
            DistanceMetric::parse("euclidean").unwrap(),
            DistanceMetric::L2
        );
        assert_eq!(DistanceMetric::parse("inner").unwrap(), DistanceMetric::Dot);
        assert_eq!(
            DistanceMetric::parse("manhattan").unwrap(),
            DistanceMetric::L1
        );
    }

    #[test]
    fn unknown_metric_is_invalid_argument() {
        assert!(matches!(
            DistanceMetric::parse("jaccard"),
            Err(Error::InvalidArgument(_))
        ));
    }
}
