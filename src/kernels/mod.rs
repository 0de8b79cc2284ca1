//! Distance kernels and runtime backend dispatch.
//!
//! Three backends exist per element type: [`scalar`] (portable fallback),
//! and two wider tiers in [`simd`] named by their nominal lane width
//! (128-bit / 4 lanes and 256-bit / 8 lanes). For `f32` these genuinely use
//! the `wide` crate's portable SIMD types; the `u8`/`i8` kernels use a
//! hand-rolled widened-accumulator loop instead (see [`simd`]'s module
//! doc), so "128"/"256" there names the unroll factor, not a `wide` lane
//! count. The best backend for the running CPU is detected once and
//! cached, the same zero-overhead `OnceLock` dispatch this module is
//! grounded on.

pub mod scalar;
pub mod simd;

use crate::half_precision::{bf16_to_f32, f16_to_f32};
use crate::metric::DistanceMetric;
use std::sync::OnceLock;

/// Which kernel tier is in use on this CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Plain iterator-based kernels, used when no wider SIMD tier applies.
    Scalar,
    /// `wide`-backed 128-bit `f32` lanes (4 per step); `u8`/`i8` kernels in
    /// this tier unroll 16 elements per step instead of using `wide` lanes.
    Simd128,
    /// `wide`-backed 256-bit `f32` lanes (8 per step); `u8`/`i8` kernels in
    /// this tier unroll 32 elements per step instead of using `wide` lanes.
    Simd256,
}

impl Backend {
    /// Canonical name reported by the `backend()` scalar function.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Scalar => "SCALAR",
            Self::Simd128 => "SIMD128",
            Self::Simd256 => "SIMD256",
        }
    }
}

static BACKEND: OnceLock<Backend> = OnceLock::new();

fn select_backend() -> Backend {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return Backend::Simd256;
        }
        if is_x86_feature_detected!("sse2") {
            return Backend::Simd128;
        }
        Backend::Scalar
    }
    #[cfg(target_arch = "aarch64")]
    {
        // NEON is guaranteed on every aarch64 target; `wide` uses it under
        // the hood for both lane-width tiers, so prefer the wider one.
        Backend::Simd256
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    Backend::Scalar
}

/// Returns the backend selected for this process, detecting it on first
/// call and caching the result thereafter.
#[must_use]
pub fn backend() -> Backend {
    *BACKEND.get_or_init(select_backend)
}

/// Canonical name of the active backend, as reported by the `backend()`
/// scalar function exposed to the host.
#[must_use]
pub fn backend_name() -> &'static str {
    backend().name()
}

type F32Kernel = fn(&[f32], &[f32]) -> f32;
type U8Kernel = fn(&[u8], &[u8]) -> f32;
type I8Kernel = fn(&[i8], &[i8]) -> f32;

fn f32_kernel(metric: DistanceMetric, b: Backend) -> F32Kernel {
    use scalar as s;
    use simd as d;
    match (metric, b) {
        (DistanceMetric::L2, Backend::Scalar) => s::l2_f32,
        (DistanceMetric::L2, Backend::Simd128) => d::l2_f32_128,
        (DistanceMetric::L2, Backend::Simd256) => d::l2_f32_256,
        (DistanceMetric::SquaredL2, Backend::Scalar) => s::squared_l2_f32,
        (DistanceMetric::SquaredL2, Backend::Simd128) => d::squared_l2_f32_128,
        (DistanceMetric::SquaredL2, Backend::Simd256) => d::squared_l2_f32_256,
        (DistanceMetric::L1, Backend::Scalar) => s::l1_f32,
        (DistanceMetric::L1, Backend::Simd128) => d::l1_f32_128,
        (DistanceMetric::L1, Backend::Simd256) => d::l1_f32_256,
        (DistanceMetric::Dot, Backend::Scalar) => s::dot_f32,
        (DistanceMetric::Dot, Backend::Simd128) => d::dot_f32_128,
        (DistanceMetric::Dot, Backend::Simd256) => d::dot_f32_256,
        (DistanceMetric::Cosine, Backend::Scalar) => s::cosine_f32,
        (DistanceMetric::Cosine, Backend::Simd128) => d::cosine_f32_128,
        (DistanceMetric::Cosine, Backend::Simd256) => d::cosine_f32_256,
    }
}

fn u8_kernel(metric: DistanceMetric, b: Backend) -> U8Kernel {
    use scalar as s;
    use simd as d;
    match (metric, b) {
        (DistanceMetric::L2, Backend::Scalar) => s::l2_u8,
        (DistanceMetric::L2, Backend::Simd128) => d::l2_u8_128,
        (DistanceMetric::L2, Backend::Simd256) => d::l2_u8_256,
        (DistanceMetric::SquaredL2, Backend::Scalar) => s::squared_l2_u8,
        (DistanceMetric::SquaredL2, Backend::Simd128) => d::squared_l2_u8_128,
        (DistanceMetric::SquaredL2, Backend::Simd256) => d::squared_l2_u8_256,
        (DistanceMetric::L1, Backend::Scalar) => s::l1_u8,
        (DistanceMetric::L1, Backend::Simd128) => d::l1_u8_128,
        (DistanceMetric::L1, Backend::Simd256) => d::l1_u8_256,
        (DistanceMetric::Dot, Backend::Scalar) => s::dot_u8,
        (DistanceMetric::Dot, Backend::Simd128) => d::dot_u8_128,
        (DistanceMetric::Dot, Backend::Simd256) => d::dot_u8_256,
        (DistanceMetric::Cosine, Backend::Scalar) => s::cosine_u8,
        (DistanceMetric::Cosine, Backend::Simd128) => d::cosine_u8_128,
        (DistanceMetric::Cosine, Backend::Simd256) => d::cosine_u8_256,
    }
}

fn i8_kernel(metric: DistanceMetric, b: Backend) -> I8Kernel {
    use scalar as s;
    use simd as d;
    match (metric, b) {
        (DistanceMetric::L2, Backend::Scalar) => s::l2_i8,
        (DistanceMetric::L2, Backend::Simd128) => d::l2_i8_128,
        (DistanceMetric::L2, Backend::Simd256) => d::l2_i8_256,
        (DistanceMetric::SquaredL2, Backend::Scalar) => s::squared_l2_i8,
        (DistanceMetric::SquaredL2, Backend::Simd128) => d::squared_l2_i8_128,
        (DistanceMetric::SquaredL2, Backend::Simd256) => d::squared_l2_i8_256,
        (DistanceMetric::L1, Backend::Scalar) => s::l1_i8,
        (DistanceMetric::L1, Backend::Simd128) => d::l1_i8_128,
        (DistanceMetric::L1, Backend::Simd256) => d::l1_i8_256,
        (DistanceMetric::Dot, Backend::Scalar) => s::dot_i8,
        (DistanceMetric::Dot, Backend::Simd128) => d::dot_i8_128,
        (DistanceMetric::Dot, Backend::Simd256) => d::dot_i8_256,
        (DistanceMetric::Cosine, Backend::Scalar) => s::cosine_i8,
        (DistanceMetric::Cosine, Backend::Simd128) => d::cosine_i8_128,
        (DistanceMetric::Cosine, Backend::Simd256) => d::cosine_i8_256,
    }
}

/// Computes `metric(a, b)` for `f32` elements using the active backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn distance_f32(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    f32_kernel(metric, backend())(a, b)
}

/// Computes `metric(a, b)` for `u8` elements using the active backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn distance_u8(metric: DistanceMetric, a: &[u8], b: &[u8]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    u8_kernel(metric, backend())(a, b)
}

/// Computes `metric(a, b)` for `i8` elements using the active backend.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn distance_i8(metric: DistanceMetric, a: &[i8], b: &[i8]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    i8_kernel(metric, backend())(a, b)
}

/// Computes `metric(a, b)` for binary16-encoded elements by upconverting
/// to `f32`; there is no dedicated half-precision kernel tier.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn distance_f16(metric: DistanceMetric, a: &[u16], b: &[u16]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let a: Vec<f32> = a.iter().copied().map(f16_to_f32).collect();
    let b: Vec<f32> = b.iter().copied().map(f16_to_f32).collect();
    distance_f32(metric, &a, &b)
}

/// Computes `metric(a, b)` for bfloat16-encoded elements by upconverting
/// to `f32`; there is no dedicated half-precision kernel tier.
///
/// # Panics
///
/// Panics if `a.len() != b.len()`.
#[must_use]
pub fn distance_bf16(metric: DistanceMetric, a: &[u16], b: &[u16]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let a: Vec<f32> = a.iter().copied().map(bf16_to_f32).collect();
    let b: Vec<f32> = b.iter().copied().map(bf16_to_f32).collect();
    distance_f32(metric, &a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_name_is_one_of_the_known_tiers() {
        let name = backend_name();
        assert!(["SCALAR", "SIMD128", "SIMD256"].contains(&name));
    }

    #[test]
    fn dispatch_agrees_with_scalar_for_every_metric() {
        let a = [1.0f32, -2.5, 3.0, 0.25, 7.0, -1.0, 2.0, 4.5];
        let b = [0.5f32, 1.5, -3.0, 0.25, 6.0, -1.0, -2.0, 4.0];
        for m in DistanceMetric::ALL {
            let got = distance_f32(m, &a, &b);
            let want = f32_kernel(m, Backend::Scalar)(&a, &b);
            assert!((got - want).abs() < 1e-3, "{m:?} backend={:?}", backend());
        }
    }

    #[test]
    fn half_precision_dispatch_matches_upconverted_f32() {
        let a = [1.0f32, 2.0, 3.0, 4.0];
        let b = [4.0f32, 3.0, 2.0, 1.0];
        let a16: Vec<u16> = a.iter().map(|&x| crate::half_precision::f32_to_f16(x)).collect();
        let b16: Vec<u16> = b.iter().map(|&x| crate::half_precision::f32_to_f16(x)).collect();
        let got = distance_f16(DistanceMetric::L2, &a16, &b16);
        let want = distance_f32(DistanceMetric::L2, &a, &b);
        assert!((got - want).abs() < 1e-2);
    }
}
