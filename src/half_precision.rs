//! Binary16 (IEEE half) and bfloat16 ↔ binary32 conversions.
//!
//! The shadow store and the quantizer both need to upconvert narrow stored
//! elements to `f32` before doing any arithmetic, and the `as_f16`/`as_bf16`
//! converters need the reverse direction. Both directions must be bit-exact:
//! every finite `f16`/`bf16` value round-trips through `f32` unchanged, and
//! NaN sign/payload bits are preserved rather than canonicalized.
//!
//! Rather than hand-roll the bit manipulation, we lean on the `half` crate
//! (already part of the ambient stack for vector storage), which implements
//! exactly this contract: round-to-nearest-even on narrowing, subnormals in
//! both directions, and payload-preserving NaNs.

use half::{bf16, f16};

/// Converts a stored binary16 bit pattern to `f32`.
#[inline]
#[must_use]
pub fn f16_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// Converts an `f32` to a binary16 bit pattern, rounding to nearest-even;
/// overflow saturates to infinity, matching IEEE 754 narrowing conversion.
#[inline]
#[must_use]
pub fn f32_to_f16(value: f32) -> u16 {
    f16::from_f32(value).to_bits()
}

/// Converts a stored bfloat16 bit pattern to `f32`.
#[inline]
#[must_use]
pub fn bf16_to_f32(bits: u16) -> f32 {
    bf16::from_bits(bits).to_f32()
}

/// Converts an `f32` to a bfloat16 bit pattern (the upper 16 bits of the
/// `f32` representation, rounded to nearest-even).
#[inline]
#[must_use]
pub fn f32_to_bf16(value: f32) -> u16 {
    bf16::from_f32(value).to_bits()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f16_round_trip_is_exact_for_finite_values() {
        for bits in 0u16..=u16::MAX {
            let v = f16::from_bits(bits);
            if v.is_nan() {
                continue;
            }
            let back = f32_to_f16(f16_to_f32(bits));
            assert_eq!(back, bits, "round trip failed for bits {bits:#06x}");
        }
    }

    #[test]
    fn f16_nan_payload_preserved() {
        let nan_bits: u16 = 0x7e01; // quiet NaN with a non-zero payload
        let back = f32_to_f16(f16_to_f32(nan_bits));
        assert_eq!(back, nan_bits);
    }

    #[test]
    fn f16_zero_and_infinity() {
        assert_eq!(f16_to_f32(0x0000), 0.0);
        assert_eq!(f16_to_f32(0x8000), -0.0);
        assert!(f16_to_f32(0x7c00).is_infinite());
        assert!(f16_to_f32(0xfc00).is_infinite() && f16_to_f32(0xfc00) < 0.0);
    }

    #[test]
    fn f16_subnormals_round_trip() {
        // smallest positive subnormal
        let bits = 0x0001u16;
        assert_eq!(f32_to_f16(f16_to_f32(bits)), bits);
    }

    #[test]
    fn bf16_is_upper_16_bits_of_f32() {
        let value = 3.14159_f32;
        let expected = (value.to_bits() >> 16) as u16;
        assert_eq!(f32_to_bf16(value), expected);
    }

    #[test]
    fn bf16_round_trip_for_representable_values() {
        let bits: u16 = 0x4049; // representable bf16 value
        let back = f32_to_bf16(bf16_to_f32(bits));
        assert_eq!(back, bits);
    }
}
