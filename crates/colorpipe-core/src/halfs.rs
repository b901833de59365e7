//! Half-float bit-pattern helpers for half-domain LUTs.
//!
//! A half-domain LUT has 65536 entries and is indexed by the IEEE 754
//! half-precision bit pattern of the input, not by its numerical value.
//! The constants here name the landmark patterns the inversion code keys on.

use half::f16;

/// Number of entries in a half-domain LUT (one per half bit pattern).
pub const HALF_DOMAIN_ENTRIES: usize = 65536;

/// Bit pattern of +0.0.
pub const POS_ZERO_BITS: u16 = 0x0000;

/// Bit pattern of 1.0 (15360).
pub const ONE_BITS: u16 = 0x3C00;

/// Largest finite positive half, 65504.0 (31743).
pub const MAX_POS_BITS: u16 = 0x7BFF;

/// Bit pattern of +infinity (31744).
pub const POS_INF_BITS: u16 = 0x7C00;

/// Bit pattern of -0.0 (32768).
pub const NEG_ZERO_BITS: u16 = 0x8000;

/// Largest-magnitude finite negative half, -65504.0 (64511).
pub const MAX_NEG_BITS: u16 = 0xFBFF;

/// Bit pattern of -infinity (64512).
pub const NEG_INF_BITS: u16 = 0xFC00;

/// The float value whose half representation is bit pattern `bits`.
#[inline]
pub fn half_bits_to_f32(bits: u16) -> f32 {
    f16::from_bits(bits).to_f32()
}

/// The half bit pattern of `v` (round-to-nearest-even, overflow to ±inf).
#[inline]
pub fn f32_to_half_bits(v: f32) -> u16 {
    f16::from_f32(v).to_bits()
}

/// Whether two half values differ by more than `ulps` representation steps.
///
/// NaNs always differ; +0 and -0 compare equal.
pub fn halfs_differ(a: f16, b: f16, ulps: u16) -> bool {
    if a.is_nan() || b.is_nan() {
        return true;
    }
    // Map the sign-magnitude bit patterns onto a monotone integer line.
    let to_ordered = |h: f16| -> i32 {
        let bits = h.to_bits();
        if bits & 0x8000 != 0 {
            -((bits & 0x7FFF) as i32)
        } else {
            (bits & 0x7FFF) as i32
        }
    };
    (to_ordered(a) - to_ordered(b)).unsigned_abs() > u32::from(ulps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_patterns() {
        assert_eq!(half_bits_to_f32(POS_ZERO_BITS), 0.0);
        assert_eq!(half_bits_to_f32(ONE_BITS), 1.0);
        assert_eq!(half_bits_to_f32(MAX_POS_BITS), 65504.0);
        assert!(half_bits_to_f32(POS_INF_BITS).is_infinite());
        assert_eq!(half_bits_to_f32(NEG_ZERO_BITS), -0.0);
        assert!(half_bits_to_f32(NEG_ZERO_BITS).is_sign_negative());
        assert_eq!(half_bits_to_f32(MAX_NEG_BITS), -65504.0);
        assert!(half_bits_to_f32(NEG_INF_BITS).is_infinite());
    }

    #[test]
    fn round_trip_one() {
        assert_eq!(f32_to_half_bits(1.0), ONE_BITS);
        assert_eq!(f32_to_half_bits(-0.0), NEG_ZERO_BITS);
        assert_eq!(f32_to_half_bits(f32::INFINITY), POS_INF_BITS);
        // Overflow saturates to infinity.
        assert_eq!(f32_to_half_bits(1.0e9), POS_INF_BITS);
    }

    #[test]
    fn ulp_comparison() {
        let a = f16::from_bits(0x3C00);
        let b = f16::from_bits(0x3C01);
        assert!(!halfs_differ(a, b, 1));
        assert!(halfs_differ(a, f16::from_bits(0x3C02), 1));
        // Signed zeros are a single point on the number line.
        assert!(!halfs_differ(f16::from_bits(POS_ZERO_BITS), f16::from_bits(NEG_ZERO_BITS), 0));
        assert!(halfs_differ(f16::NAN, f16::NAN, 1000));
    }
}
