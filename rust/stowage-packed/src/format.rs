//! Physical layouts of packed arrays and the layout selection heuristic.

use stowage_common::{Result, error::Error};

/// No memory overhead is acceptable; the most compact layout is chosen.
pub const COMPACT: f32 = 0.0;

/// At most 25% memory overhead.
pub const DEFAULT: f32 = 0.25;

/// At most 50% memory overhead.
pub const FAST: f32 = 0.5;

/// Any overhead is acceptable; the fastest layout is always chosen.
pub const FASTEST: f32 = 7.0;

/// Default memory budget, in bytes, for the buffers of streaming codecs and copies.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Widths supported by [`Format::PackedSingleBlock`].
pub const SINGLE_BLOCK_WIDTHS: [u32; 14] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 12, 16, 21, 32];

/// Largest value count of the 24-bit and 48-bit three-block arrays, which keep their
/// element count within the signed 32-bit range.
pub const THREE_BLOCKS_MAX_SIZE: usize = i32::MAX as usize / 3;

/// Bit layout of a packed array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Values are laid out contiguously, most significant bit first, and may straddle
    /// 64-bit word boundaries.
    Packed,
    /// Each 64-bit word holds `64 / bits_per_value` values, least significant first.
    /// Trailing bits of a word are unused, so no value ever straddles two words.
    PackedSingleBlock,
}

impl Format {
    pub fn id(self) -> u32 {
        match self {
            Format::Packed => 0,
            Format::PackedSingleBlock => 1,
        }
    }

    pub fn from_id(id: u32) -> Result<Format> {
        match id {
            0 => Ok(Format::Packed),
            1 => Ok(Format::PackedSingleBlock),
            _ => Err(Error::invalid_format("format id", format!("unknown id {id}"))),
        }
    }

    /// Number of bytes needed to serialize `value_count` values of `bits_per_value` bits.
    pub fn byte_count(self, value_count: usize, bits_per_value: u32) -> usize {
        debug_assert!((1..=64).contains(&bits_per_value));
        match self {
            Format::Packed => (value_count as u64 * bits_per_value as u64).div_ceil(8) as usize,
            Format::PackedSingleBlock => 8 * self.long_count(value_count, bits_per_value),
        }
    }

    /// Number of 64-bit words needed to hold `value_count` values of `bits_per_value` bits.
    pub fn long_count(self, value_count: usize, bits_per_value: u32) -> usize {
        debug_assert!((1..=64).contains(&bits_per_value));
        match self {
            Format::Packed => (value_count as u64 * bits_per_value as u64).div_ceil(64) as usize,
            Format::PackedSingleBlock => {
                let values_per_block = (64 / bits_per_value) as usize;
                value_count.div_ceil(values_per_block)
            }
        }
    }

    pub fn is_supported(self, bits_per_value: u32) -> bool {
        match self {
            Format::Packed => (1..=64).contains(&bits_per_value),
            Format::PackedSingleBlock => SINGLE_BLOCK_WIDTHS.contains(&bits_per_value),
        }
    }

    /// Average number of wasted bits per stored value.
    pub fn overhead_per_value(self, bits_per_value: u32) -> f32 {
        debug_assert!(self.is_supported(bits_per_value));
        match self {
            Format::Packed => 0.0,
            Format::PackedSingleBlock => {
                let values_per_block = 64 / bits_per_value;
                let overhead = 64 % bits_per_value;
                overhead as f32 / values_per_block as f32
            }
        }
    }

    /// Wasted bits relative to the useful ones.
    pub fn overhead_ratio(self, bits_per_value: u32) -> f32 {
        self.overhead_per_value(bits_per_value) / bits_per_value as f32
    }
}

/// A concrete layout: a format together with the width actually used to store values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormatAndBits {
    pub format: Format,
    pub bits_per_value: u32,
}

impl FormatAndBits {
    pub fn new(format: Format, bits_per_value: u32) -> FormatAndBits {
        FormatAndBits {
            format,
            bits_per_value,
        }
    }

    /// Picks the fastest layout for `bits_per_value`-bit values whose memory overhead
    /// stays within `acceptable_overhead_ratio` (clamped to `[COMPACT, FASTEST]`).
    ///
    /// Byte-aligned widths are preferred, then the 24/48-bit three-block layouts,
    /// then the narrowest affordable single-block width. `Packed` at the requested
    /// width is the fallback. An unknown value count is passed as `None`.
    pub fn fastest(
        value_count: Option<usize>,
        bits_per_value: u32,
        acceptable_overhead_ratio: f32,
    ) -> FormatAndBits {
        debug_assert!((1..=64).contains(&bits_per_value));
        let value_count = value_count.unwrap_or(i32::MAX as usize);

        let ratio = acceptable_overhead_ratio.clamp(COMPACT, FASTEST);
        let acceptable_overhead_per_value = ratio * bits_per_value as f32;
        let max_bits_per_value = bits_per_value + acceptable_overhead_per_value as u32;

        let fits = |width: u32| bits_per_value <= width && max_bits_per_value >= width;
        let byte_aligned = [8, 16, 32, 64].into_iter().find(|&width| fits(width));
        if let Some(width) = byte_aligned {
            return FormatAndBits::new(Format::Packed, width);
        }
        if value_count <= THREE_BLOCKS_MAX_SIZE {
            if fits(24) {
                return FormatAndBits::new(Format::Packed, 24);
            }
            if fits(48) {
                return FormatAndBits::new(Format::Packed, 48);
            }
        }

        for width in bits_per_value..=max_bits_per_value.min(64) {
            if Format::PackedSingleBlock.is_supported(width) {
                let overhead = Format::PackedSingleBlock.overhead_per_value(width);
                let acceptable =
                    acceptable_overhead_per_value + bits_per_value as f32 - width as f32;
                if overhead <= acceptable {
                    return FormatAndBits::new(Format::PackedSingleBlock, width);
                }
            }
        }
        FormatAndBits::new(Format::Packed, bits_per_value)
    }
}
