//! Scalar (non-SIMD) fallback kernels.
//!
//! Every SIMD backend is numerically required to agree with these within
//! the tolerance documented in `kernels::mod`; keeping them simple and
//! branch-free-ish makes them the reference implementation for tests.

#[inline]
pub fn l2_f32(a: &[f32], b: &[f32]) -> f32 {
    squared_l2_f32(a, b).sqrt()
}

#[inline]
pub fn squared_l2_f32(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[inline]
pub fn l1_f32(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

#[inline]
pub fn dot_f32(a: &[f32], b: &[f32]) -> f32 {
    -a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>()
}

#[inline]
pub fn cosine_f32(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
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

#[inline]
pub fn l2_u8(a: &[u8], b: &[u8]) -> f32 {
    (squared_l2_u8_i64(a, b) as f32).sqrt()
}

#[inline]
pub fn squared_l2_u8(a: &[u8], b: &[u8]) -> f32 {
    squared_l2_u8_i64(a, b) as f32
}

fn squared_l2_u8_i64(a: &[u8], b: &[u8]) -> i64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = i64::from(x) - i64::from(y);
            d * d
        })
        .sum()
}

#[inline]
pub fn l1_u8(a: &[u8], b: &[u8]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (i32::from(x) - i32::from(y)).unsigned_abs())
        .sum::<u32>() as f32
}

#[inline]
pub fn dot_u8(a: &[u8], b: &[u8]) -> f32 {
    let dot: i64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| i64::from(x) * i64::from(y))
        .sum();
    -(dot as f32)
}

#[inline]
pub fn cosine_u8(a: &[u8], b: &[u8]) -> f32 {
    let mut dot: i64 = 0;
    let mut na: i64 = 0;
    let mut nb: i64 = 0;
    for (&x, &y) in a.iter().zip(b) {
        let (xi, yi) = (i64::from(x), i64::from(y));
        dot += xi * yi;
        na += xi * xi;
        nb += yi * yi;
    }
    let denom = (na as f64).sqrt() * (nb as f64).sqrt();
    if denom == 0.0 {
        1.0
    } else {
        (1.0 - (dot as f64) / denom) as f32
    }
}

#[inline]
pub fn l2_i8(a: &[i8], b: &[i8]) -> f32 {
    (squared_l2_i8_i64(a, b) as f32).sqrt()
}

#[inline]
pub fn squared_l2_i8(a: &[i8], b: &[i8]) -> f32 {
    squared_l2_i8_i64(a, b) as f32
}

fn squared_l2_i8_i64(a: &[i8], b: &[i8]) -> i64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = i64::from(x) - i64::from(y);
            d * d
        })
        .sum()
}

/// `|a_i - b_i|` can reach 255 for `i8` inputs, which overflows `i8`'s
/// [-128, 127] range: widen to `i32` before taking the absolute value.
#[inline]
pub fn l1_i8(a: &[i8], b: &[i8]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (i32::from(x) - i32::from(y)).unsigned_abs())
        .sum::<u32>() as f32
}

#[inline]
pub fn dot_i8(a: &[i8], b: &[i8]) -> f32 {
    let dot: i64 = a
        .iter()
        .zip(b)
        .map(|(&x, &y)| i64::from(x) * i64::from(y))
        .sum();
    -(dot as f32)
}

#[inline]
pub fn cosine_i8(a: &[i8], b: &[i8]) -> f32 {
    let mut dot: i64 = 0;
    let mut na: i64 = 0;
    let mut nb: i64 = 0;
    for (&x, &y) in a.iter().zip(b) {
        let (xi, yi) = (i64::from(x), i64::from(y));
        dot += xi * yi;
        na += xi * xi;
        nb += yi * yi;
    }
    let denom = (na as f64).sqrt() * (nb as f64).sqrt();
    if denom == 0.0 {
        1.0
    } else {
        (1.0 - (dot as f64) / denom) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_of_identical_vector_is_zero() {
        let a = [1.0f32, 2.0, 3.0];
        assert_eq!(l2_f32(&a, &a), 0.0);
    }

    #[test]
    fn scenario_a_dim4_f32_l2() {
        let a = [1.0f32, 0.0, 0.0, 0.0];
        let b = [0.0f32, 1.0, 0.0, 0.0];
        assert!((l2_f32(&a, &b) - std::f32::consts::SQRT_2).abs() < 1e-6);
        assert!((squared_l2_f32(&a, &b) - 2.0).abs() < 1e-6);
        assert!((l1_f32(&a, &b) - 2.0).abs() < 1e-6);
        assert_eq!(dot_f32(&a, &b), -0.0);
        assert!((cosine_f32(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn scenario_b_dim3_u8_l2() {
        let a = [10u8, 20, 30];
        let b = [10u8, 22, 26];
        assert!((squared_l2_u8(&a, &b) - 20.0).abs() < 1e-6);
        assert!((l2_u8(&a, &b) - 20.0f32.sqrt()).abs() < 1e-5);
    }

    #[test]
    fn scenario_c_dim3_i8_dot() {
        let a = [-1i8, 2, -3];
        let b = [4i8, -5, 6];
        assert!((dot_i8(&a, &b) - 32.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_norm_is_one() {
        let a = [0.0f32, 0.0, 0.0];
        let b = [1.0f32, 2.0, 3.0];
        assert_eq!(cosine_f32(&a, &b), 1.0);
    }

    #[test]
    fn dot_is_symmetric() {
        let a = [1.0f32, -2.0, 3.5];
        let b = [4.0f32, 0.5, -1.0];
        assert_eq!(dot_f32(&a, &b), dot_f32(&b, &a));
    }

    #[test]
    fn squared_l2_equals_l2_squared() {
        let a = [3.0f32, -1.0, 7.0, 2.5];
        let b = [0.5f32, 2.0, -4.0, 1.0];
        let l2 = l2_f32(&a, &b);
        let sq = squared_l2_f32(&a, &b);
        assert!((sq - l2 * l2).abs() < 1e-3);
    }
}
