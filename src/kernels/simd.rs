//! SIMD kernels for two lane widths: 128-bit (4 `f32` / 16 int8 lanes) and
//! 256-bit (8 `f32` / 32 int8 lanes).
//!
//! `f32` kernels use the `wide` crate's portable SIMD types directly, the
//! same technique the "explicit SIMD" distance code this module is
//! grounded on uses. Integer kernels widen each lane to `i32`/`i64` and
//! accumulate in four interleaved partial sums per lane group, mirroring
//! the unrolled accumulator pattern used for quantized int8 distances
//! elsewhere in the corpus. Every function finishes any remainder through
//! the scalar kernel, so results agree with `kernels::scalar` within
//! floating-point association error.

use super::scalar;
use wide::{f32x4, f32x8};

#[inline]
pub fn squared_l2_f32_128(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 4;
    let mut acc = f32x4::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x4::from(<[f32; 4]>::try_from(&a[i..i + 4]).unwrap());
        let vb = f32x4::from(<[f32; 4]>::try_from(&b[i..i + 4]).unwrap());
        let d = va - vb;
        acc = d.mul_add(d, acc);
        i += 4;
    }
    acc.reduce_add() + scalar::squared_l2_f32(&a[body..], &b[body..])
}

#[inline]
pub fn squared_l2_f32_256(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 8;
    let mut acc = f32x8::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x8::from(<[f32; 8]>::try_from(&a[i..i + 8]).unwrap());
        let vb = f32x8::from(<[f32; 8]>::try_from(&b[i..i + 8]).unwrap());
        let d = va - vb;
        acc = d.mul_add(d, acc);
        i += 8;
    }
    acc.reduce_add() + scalar::squared_l2_f32(&a[body..], &b[body..])
}

#[inline]
pub fn l2_f32_128(a: &[f32], b: &[f32]) -> f32 {
    squared_l2_f32_128(a, b).sqrt()
}

#[inline]
pub fn l2_f32_256(a: &[f32], b: &[f32]) -> f32 {
    squared_l2_f32_256(a, b).sqrt()
}

#[inline]
pub fn l1_f32_128(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 4;
    let mut acc = f32x4::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x4::from(<[f32; 4]>::try_from(&a[i..i + 4]).unwrap());
        let vb = f32x4::from(<[f32; 4]>::try_from(&b[i..i + 4]).unwrap());
        acc += (va - vb).abs();
        i += 4;
    }
    acc.reduce_add() + scalar::l1_f32(&a[body..], &b[body..])
}

#[inline]
pub fn l1_f32_256(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 8;
    let mut acc = f32x8::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x8::from(<[f32; 8]>::try_from(&a[i..i + 8]).unwrap());
        let vb = f32x8::from(<[f32; 8]>::try_from(&b[i..i + 8]).unwrap());
        acc += (va - vb).abs();
        i += 8;
    }
    acc.reduce_add() + scalar::l1_f32(&a[body..], &b[body..])
}

#[inline]
pub fn dot_f32_128(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 4;
    let mut acc = f32x4::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x4::from(<[f32; 4]>::try_from(&a[i..i + 4]).unwrap());
        let vb = f32x4::from(<[f32; 4]>::try_from(&b[i..i + 4]).unwrap());
        acc = va.mul_add(vb, acc);
        i += 4;
    }
    let sum = acc.reduce_add();
    let tail: f32 = a[body..].iter().zip(&b[body..]).map(|(x, y)| x * y).sum();
    -(sum + tail)
}

#[inline]
pub fn dot_f32_256(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 8;
    let mut acc = f32x8::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x8::from(<[f32; 8]>::try_from(&a[i..i + 8]).unwrap());
        let vb = f32x8::from(<[f32; 8]>::try_from(&b[i..i + 8]).unwrap());
        acc = va.mul_add(vb, acc);
        i += 8;
    }
    let sum = acc.reduce_add();
    let tail: f32 = a[body..].iter().zip(&b[body..]).map(|(x, y)| x * y).sum();
    -(sum + tail)
}

#[inline]
pub fn cosine_f32_128(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 4;
    let mut dot = f32x4::ZERO;
    let mut na = f32x4::ZERO;
    let mut nb = f32x4::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x4::from(<[f32; 4]>::try_from(&a[i..i + 4]).unwrap());
        let vb = f32x4::from(<[f32; 4]>::try_from(&b[i..i + 4]).unwrap());
        dot = va.mul_add(vb, dot);
        na = va.mul_add(va, na);
        nb = vb.mul_add(vb, nb);
        i += 4;
    }
    cosine_finish(
        dot.reduce_add(),
        na.reduce_add(),
        nb.reduce_add(),
        &a[body..],
        &b[body..],
    )
}

#[inline]
pub fn cosine_f32_256(a: &[f32], b: &[f32]) -> f32 {
    let body = a.len() - a.len() % 8;
    let mut dot = f32x8::ZERO;
    let mut na = f32x8::ZERO;
    let mut nb = f32x8::ZERO;
    let mut i = 0;
    while i < body {
        let va = f32x8::from(<[f32; 8]>::try_from(&a[i..i + 8]).unwrap());
        let vb = f32x8::from(<[f32; 8]>::try_from(&b[i..i + 8]).unwrap());
        dot = va.mul_add(vb, dot);
        na = va.mul_add(va, na);
        nb = vb.mul_add(vb, nb);
        i += 8;
    }
    cosine_finish(
        dot.reduce_add(),
        na.reduce_add(),
        nb.reduce_add(),
        &a[body..],
        &b[body..],
    )
}

fn cosine_finish(mut dot: f32, mut na: f32, mut nb: f32, ta: &[f32], tb: &[f32]) -> f32 {
    for (x, y) in ta.iter().zip(tb) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        1.0
    } else {
        1.0 - dot / denom
    }
}

// --- Integer kernels -------------------------------------------------
//
// Widened i64 accumulation, unrolled into 4 interleaved partial sums per
// lane group (16-wide for the 128-bit tier, 32-wide for the 256-bit
// tier) to break the serial dependency chain the way a real SIMD lane
// group would. The remainder is handed to the scalar kernel.

/// Sums `step(i)` over `[0, body)` using 4 interleaved accumulators,
/// `body` being the largest multiple of `lanes` not exceeding `n`.
#[inline]
fn unrolled_sum(n: usize, lanes: usize, mut step: impl FnMut(usize) -> i64) -> (i64, usize) {
    let group = lanes / 4;
    let body = n - n % lanes;
    let mut sums = [0i64; 4];
    let mut i = 0;
    while i < body {
        for (g, sum) in sums.iter_mut().enumerate() {
            let base = i + g * group;
            for k in 0..group {
                *sum += step(base + k);
            }
        }
        i += lanes;
    }
    (sums.iter().sum(), body)
}

#[inline]
pub fn squared_l2_u8_128(a: &[u8], b: &[u8]) -> f32 {
    squared_l2_u8(a, b, 16)
}
#[inline]
pub fn squared_l2_u8_256(a: &[u8], b: &[u8]) -> f32 {
    squared_l2_u8(a, b, 32)
}
fn squared_l2_u8(a: &[u8], b: &[u8], lanes: usize) -> f32 {
    let (sum, body) = unrolled_sum(a.len(), lanes, |i| {
        let d = i64::from(a[i]) - i64::from(b[i]);
        d * d
    });
    (sum as f32) + scalar::squared_l2_u8(&a[body..], &b[body..])
}

#[inline]
pub fn l2_u8_128(a: &[u8], b: &[u8]) -> f32 {
    squared_l2_u8_128(a, b).sqrt()
}
#[inline]
pub fn l2_u8_256(a: &[u8], b: &[u8]) -> f32 {
    squared_l2_u8_256(a, b).sqrt()
}

#[inline]
pub fn l1_u8_128(a: &[u8], b: &[u8]) -> f32 {
    l1_u8(a, b, 16)
}
#[inline]
pub fn l1_u8_256(a: &[u8], b: &[u8]) -> f32 {
    l1_u8(a, b, 32)
}
fn l1_u8(a: &[u8], b: &[u8], lanes: usize) -> f32 {
    let (sum, body) = unrolled_sum(a.len(), lanes, |i| {
        (i64::from(a[i]) - i64::from(b[i])).unsigned_abs() as i64
    });
    (sum as f32) + scalar::l1_u8(&a[body..], &b[body..])
}

#[inline]
pub fn dot_u8_128(a: &[u8], b: &[u8]) -> f32 {
    dot_u8(a, b, 16)
}
#[inline]
pub fn dot_u8_256(a: &[u8], b: &[u8]) -> f32 {
    dot_u8(a, b, 32)
}
fn dot_u8(a: &[u8], b: &[u8], lanes: usize) -> f32 {
    let (sum, body) = unrolled_sum(a.len(), lanes, |i| i64::from(a[i]) * i64::from(b[i]));
    let tail: i64 = a[body..]
        .iter()
        .zip(&b[body..])
        .map(|(&x, &y)| i64::from(x) * i64::from(y))
        .sum();
    -((sum + tail) as f32)
}

#[inline]
pub fn cosine_u8_128(a: &[u8], b: &[u8]) -> f32 {
    cosine_u8(a, b, 16)
}
#[inline]
pub fn cosine_u8_256(a: &[u8], b: &[u8]) -> f32 {
    cosine_u8(a, b, 32)
}
fn cosine_u8(a: &[u8], b: &[u8], lanes: usize) -> f32 {
    let (dot, body_d) = unrolled_sum(a.len(), lanes, |i| i64::from(a[i]) * i64::from(b[i]));
    let (na, _) = unrolled_sum(a.len(), lanes, |i| i64::from(a[i]) * i64::from(a[i]));
    let (nb, _) = unrolled_sum(a.len(), lanes, |i| i64::from(b[i]) * i64::from(b[i]));
    let mut dot = dot as f64;
    let mut na = na as f64;
    let mut nb = nb as f64;
    for (&x, &y) in a[body_d..].iter().zip(&b[body_d..]) {
        let (xi, yi) = (f64::from(x), f64::from(y));
        dot += xi * yi;
        na += xi * xi;
        nb += yi * yi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        1.0
    } else {
        (1.0 - dot / denom) as f32
    }
}

#[inline]
pub fn squared_l2_i8_128(a: &[i8], b: &[i8]) -> f32 {
    squared_l2_i8(a, b, 16)
}
#[inline]
pub fn squared_l2_i8_256(a: &[i8], b: &[i8]) -> f32 {
    squared_l2_i8(a, b, 32)
}
fn squared_l2_i8(a: &[i8], b: &[i8], lanes: usize) -> f32 {
    let (sum, body) = unrolled_sum(a.len(), lanes, |i| {
        let d = i64::from(a[i]) - i64::from(b[i]);
        d * d
    });
    (sum as f32) + scalar::squared_l2_i8(&a[body..], &b[body..])
}

#[inline]
pub fn l2_i8_128(a: &[i8], b: &[i8]) -> f32 {
    squared_l2_i8_128(a, b).sqrt()
}
#[inline]
pub fn l2_i8_256(a: &[i8], b: &[i8]) -> f32 {
    squared_l2_i8_256(a, b).sqrt()
}

/// `|a_i - b_i|` can reach 255 here, which overflows `i8`: the shared
/// `unrolled_sum` accumulator is `i64`, so the widening happens before
/// the subtraction ever risks overflow.
#[inline]
pub fn l1_i8_128(a: &[i8], b: &[i8]) -> f32 {
    l1_i8(a, b, 16)
}
#[inline]
pub fn l1_i8_256(a: &[i8], b: &[i8]) -> f32 {
    l1_i8(a, b, 32)
}
fn l1_i8(a: &[i8], b: &[i8], lanes: usize) -> f32 {
    let (sum, body) = unrolled_sum(a.len(), lanes, |i| {
        (i64::from(a[i]) - i64::from(b[i])).unsigned_abs() as i64
    });
    (sum as f32) + scalar::l1_i8(&a[body..], &b[body..])
}

#[inline]
pub fn dot_i8_128(a: &[i8], b: &[i8]) -> f32 {
    dot_i8(a, b, 16)
}
#[inline]
pub fn dot_i8_256(a: &[i8], b: &[i8]) -> f32 {
    dot_i8(a, b, 32)
}
fn dot_i8(a: &[i8], b: &[i8], lanes: usize) -> f32 {
    let (sum, body) = unrolled_sum(a.len(), lanes, |i| i64::from(a[i]) * i64::from(b[i]));
    let tail: i64 = a[body..]
        .iter()
        .zip(&b[body..])
        .map(|(&x, &y)| i64::from(x) * i64::from(y))
        .sum();
    -((sum + tail) as f32)
}

#[inline]
pub fn cosine_i8_128(a: &[i8], b: &[i8]) -> f32 {
    cosine_i8(a, b, 16)
}
#[inline]
pub fn cosine_i8_256(a: &[i8], b: &[i8]) -> f32 {
    cosine_i8(a, b, 32)
}
fn cosine_i8(a: &[i8], b: &[i8], lanes: usize) -> f32 {
    let (dot, body_d) = unrolled_sum(a.len(), lanes, |i| i64::from(a[i]) * i64::from(b[i]));
    let (na, _) = unrolled_sum(a.len(), lanes, |i| i64::from(a[i]) * i64::from(a[i]));
    let (nb, _) = unrolled_sum(a.len(), lanes, |i| i64::from(b[i]) * i64::from(b[i]));
    let mut dot = dot as f64;
    let mut na = na as f64;
    let mut nb = nb as f64;
    for (&x, &y) in a[body_d..].iter().zip(&b[body_d..]) {
        let (xi, yi) = (f64::from(x), f64::from(y));
        dot += xi * yi;
        na += xi * xi;
        nb += yi * yi;
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom == 0.0 {
        1.0
    } else {
        (1.0 - dot / denom) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::scalar;

    fn random_vecs(n: usize, seed: u64) -> (Vec<f32>, Vec<f32>) {
        let mut state = seed;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 2000) as f32 / 100.0 - 10.0
        };
        ((0..n).map(|_| next()).collect(), (0..n).map(|_| next()).collect())
    }

    #[test]
    fn f32_simd_matches_scalar_across_dimensions() {
        for &n in &[1usize, 7, 8, 31, 32, 33, 127, 128, 1024] {
            let (a, b) = random_vecs(n, 42 + n as u64);
            let norm = (a.iter().map(|x| x * x).sum::<f32>().sqrt()
                * b.iter().map(|x| x * x).sum::<f32>().sqrt())
            .max(1.0);
            let eps = 1e-3 * norm;

            assert!((scalar::l2_f32(&a, &b) - l2_f32_128(&a, &b)).abs() < eps);
            assert!((scalar::l2_f32(&a, &b) - l2_f32_256(&a, &b)).abs() < eps);
            assert!(
                (scalar::squared_l2_f32(&a, &b) - squared_l2_f32_128(&a, &b)).abs() < eps
            );
            assert!(
                (scalar::squared_l2_f32(&a, &b) - squared_l2_f32_256(&a, &b)).abs() < eps
            );
            assert!((scalar::l1_f32(&a, &b) - l1_f32_128(&a, &b)).abs() < eps);
            assert!((scalar::l1_f32(&a, &b) - l1_f32_256(&a, &b)).abs() < eps);
            assert!((scalar::dot_f32(&a, &b) - dot_f32_128(&a, &b)).abs() < eps);
            assert!((scalar::dot_f32(&a, &b) - dot_f32_256(&a, &b)).abs() < eps);
            assert!((scalar::cosine_f32(&a, &b) - cosine_f32_128(&a, &b)).abs() < 1e-4);
            assert!((scalar::cosine_f32(&a, &b) - cosine_f32_256(&a, &b)).abs() < 1e-4);
        }
    }

    fn random_u8(n: usize, seed: u64) -> (Vec<u8>, Vec<u8>) {
        let mut state = seed;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state % 256) as u8
        };
        ((0..n).map(|_| next()).collect(), (0..n).map(|_| next()).collect())
    }

    fn random_i8(n: usize, seed: u64) -> (Vec<i8>, Vec<i8>) {
        let (a, b) = random_u8(n, seed);
        (
            a.into_iter().map(|x| x as i8).collect(),
            b.into_iter().map(|x| x as i8).collect(),
        )
    }

    #[test]
    fn u8_simd_matches_scalar_across_dimensions() {
        for &n in &[1usize, 7, 8, 31, 32, 33, 127, 128, 1024] {
            let (a, b) = random_u8(n, 7 + n as u64);
            assert_eq!(scalar::squared_l2_u8(&a, &b), squared_l2_u8_128(&a, &b));
            assert_eq!(scalar::squared_l2_u8(&a, &b), squared_l2_u8_256(&a, &b));
            assert_eq!(scalar::l1_u8(&a, &b), l1_u8_128(&a, &b));
            assert_eq!(scalar::l1_u8(&a, &b), l1_u8_256(&a, &b));
            assert_eq!(scalar::dot_u8(&a, &b), dot_u8_128(&a, &b));
            assert_eq!(scalar::dot_u8(&a, &b), dot_u8_256(&a, &b));
        }
    }

    #[test]
    fn i8_simd_matches_scalar_across_dimensions() {
        for &n in &[1usize, 7, 8, 31, 32, 33, 127, 128, 1024] {
            let (a, b) = random_i8(n, 99 + n as u64);
            assert_eq!(scalar::squared_l2_i8(&a, &b), squared_l2_i8_128(&a, &b));
            assert_eq!(scalar::squared_l2_i8(&a, &b), squared_l2_i8_256(&a, &b));
            assert_eq!(scalar::l1_i8(&a, &b), l1_i8_128(&a, &b));
            assert_eq!(scalar::l1_i8(&a, &b), l1_i8_256(&a, &b));
            assert_eq!(scalar::dot_i8(&a, &b), dot_i8_128(&a, &b));
            assert_eq!(scalar::dot_i8(&a, &b), dot_i8_256(&a, &b));
        }
    }

    #[test]
    fn l1_i8_handles_overflow_edge_case() {
        // |-128 - 127| = 255, which overflows i8's range.
        let a = vec![-128i8; 32];
        let b = vec![127i8; 32];
        assert_eq!(l1_i8_256(&a, &b), 255.0 * 32.0);
    }
}
