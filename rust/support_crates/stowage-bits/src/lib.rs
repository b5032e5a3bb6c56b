//! Bit arithmetic utilities shared by the Stowage packed integer codecs.
//!
//! All of the packed structures describe their layout in terms of a fixed
//! *bits-per-value* width in `1..=64`. The helpers in this crate compute those
//! widths, the corresponding value masks, and the zig-zag bijection used to store
//! signed deltas as small unsigned integers.
//!
//! # Usage Examples
//!
//! ```rust
//! use stowage_bits::{max_value, unsigned_bits_required, zigzag_decode, zigzag_encode};
//!
//! assert_eq!(unsigned_bits_required(1023), 10);
//! assert_eq!(max_value(10), 1023);
//! assert_eq!(max_value(64), u64::MAX);
//!
//! assert_eq!(zigzag_encode(-1), 1);
//! assert_eq!(zigzag_decode(zigzag_encode(i64::MIN)), i64::MIN);
//! ```

/// Returns the number of bits required to store `value` as an unsigned integer.
///
/// Zero still requires one bit, matching the smallest width a packed array can have.
#[inline]
pub const fn unsigned_bits_required(value: u64) -> u32 {
    let bits = 64 - value.leading_zeros();
    if bits == 0 { 1 } else { bits }
}

/// Returns the number of bits required to store `value`.
///
/// Negative values are only representable at the full 64-bit width.
#[inline]
pub const fn bits_required(value: i64) -> u32 {
    if value < 0 {
        64
    } else {
        unsigned_bits_required(value as u64)
    }
}

/// Returns the largest value representable with `bits_per_value` bits, which is also the
/// right-aligned mask of that width.
///
/// Width 64 yields an all-ones mask rather than evaluating `(1 << 64) - 1`.
#[inline]
pub const fn max_value(bits_per_value: u32) -> u64 {
    debug_assert!(bits_per_value <= 64);
    if bits_per_value >= 64 {
        u64::MAX
    } else {
        (1u64 << bits_per_value) - 1
    }
}

/// Maps a signed integer to an unsigned one so that values of small magnitude stay
/// small: `0, -1, 1, -2, 2, ...` become `0, 1, 2, 3, 4, ...`.
#[inline]
pub const fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub const fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// 32-bit variant of [`zigzag_encode`].
#[inline]
pub const fn zigzag_encode_i32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

/// Inverse of [`zigzag_encode_i32`].
#[inline]
pub const fn zigzag_decode_i32(value: u32) -> i32 {
    ((value >> 1) as i32) ^ -((value & 1) as i32)
}

/// Greatest common divisor.
#[inline]
pub const fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}
