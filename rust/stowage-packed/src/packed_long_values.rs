//! Immutable compressed sequences of `i64` values built by appending.
//!
//! A builder buffers values and compresses every full page into its own packed array,
//! picking the width per page. Three encodings are available:
//! - plain: values are stored as-is, so any negative value forces 64 bits for its page;
//! - delta: the page minimum is subtracted first;
//! - monotonic: a line through the first and last value of the page is subtracted
//!   before the delta step, which suits sequences that grow at a steady rate.

use stowage_common::Result;

use crate::format::COMPACT;
use crate::ints::{
    MutableArray, NullMutable, PackedMutable, PackedReader, check_block_size, get_mutable,
};
use crate::long_values::LongValues;
use crate::monotonic_block_packed::{expected, slope};

pub const DEFAULT_PAGE_SIZE: usize = 1024;
pub const MIN_PAGE_SIZE: usize = 64;
pub const MAX_PAGE_SIZE: usize = 1 << 20;

/// Construction parameters of a [`PackedLongValuesBuilder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PackedLongValuesConfig {
    /// Number of values per page, a power of two in `MIN_PAGE_SIZE..=MAX_PAGE_SIZE`.
    pub page_size: usize,
    /// Memory overhead accepted per page in exchange for faster access, see
    /// [`FormatAndBits::fastest`](crate::FormatAndBits::fastest).
    pub acceptable_overhead_ratio: f32,
}

impl Default for PackedLongValuesConfig {
    fn default() -> Self {
        PackedLongValuesConfig {
            page_size: DEFAULT_PAGE_SIZE,
            acceptable_overhead_ratio: COMPACT,
        }
    }
}

impl PackedLongValuesConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_acceptable_overhead_ratio(mut self, acceptable_overhead_ratio: f32) -> Self {
        self.acceptable_overhead_ratio = acceptable_overhead_ratio;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Delta,
    Monotonic,
}

/// Creates a builder storing values as-is.
pub fn packed_builder(config: PackedLongValuesConfig) -> Result<PackedLongValuesBuilder> {
    PackedLongValuesBuilder::new(Encoding::Plain, config)
}

/// Creates a builder storing each page relative to its minimum.
pub fn delta_packed_builder(config: PackedLongValuesConfig) -> Result<PackedLongValuesBuilder> {
    PackedLongValuesBuilder::new(Encoding::Delta, config)
}

/// Creates a builder storing each page relative to a fitted line.
pub fn monotonic_builder(config: PackedLongValuesConfig) -> Result<PackedLongValuesBuilder> {
    PackedLongValuesBuilder::new(Encoding::Monotonic, config)
}

/// Append-only builder of [`PackedLongValues`].
#[derive(Debug)]
pub struct PackedLongValuesBuilder {
    encoding: Encoding,
    page_shift: u32,
    page_size: usize,
    acceptable_overhead_ratio: f32,
    pending: Vec<i64>,
    pages: Vec<MutableArray>,
    mins: Vec<i64>,
    averages: Vec<f32>,
    size: u64,
}

impl PackedLongValuesBuilder {
    pub fn new(
        encoding: Encoding,
        config: PackedLongValuesConfig,
    ) -> Result<PackedLongValuesBuilder> {
        let page_shift = check_block_size(config.page_size, MIN_PAGE_SIZE, MAX_PAGE_SIZE)?;
        Ok(PackedLongValuesBuilder {
            encoding,
            page_shift,
            page_size: config.page_size,
            acceptable_overhead_ratio: config.acceptable_overhead_ratio,
            pending: Vec::with_capacity(config.page_size.min(16)),
            pages: Vec::new(),
            mins: Vec::new(),
            averages: Vec::new(),
            size: 0,
        })
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Number of values added so far.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn add(&mut self, value: i64) {
        if self.pending.len() == self.page_size {
            self.pack_pending();
        }
        self.pending.push(value);
        self.size += 1;
    }

    /// Compresses the pending values and returns the immutable sequence.
    pub fn build(mut self) -> PackedLongValues {
        if !self.pending.is_empty() {
            self.pack_pending();
        }
        log::debug!(
            "built {:?} packed values: {} values in {} pages",
            self.encoding,
            self.size,
            self.pages.len()
        );
        PackedLongValues {
            encoding: self.encoding,
            page_shift: self.page_shift,
            page_mask: self.page_size as u64 - 1,
            pages: self.pages,
            mins: self.mins,
            averages: self.averages,
            size: self.size,
        }
    }

    fn pack_pending(&mut self) {
        let mut values = std::mem::take(&mut self.pending);
        let n = values.len();
        debug_assert!(n > 0);

        if self.encoding == Encoding::Monotonic {
            let average = slope(values[n - 1].wrapping_sub(values[0]) as f32, n);
            for (i, v) in values.iter_mut().enumerate() {
                *v = v.wrapping_sub(expected(0, average, i as u64));
            }
            self.averages.push(average);
        }
        if self.encoding != Encoding::Plain {
            let min = values.iter().copied().min().unwrap_or_default();
            for v in values.iter_mut() {
                *v = v.wrapping_sub(min);
            }
            self.mins.push(min);
        }

        let page = pack(&values, self.acceptable_overhead_ratio);
        log::trace!(
            "packed page {} of {n} values at {} bits",
            self.pages.len(),
            page.bits_per_value()
        );
        self.pages.push(page);

        values.clear();
        self.pending = values;
    }
}

fn pack(values: &[i64], acceptable_overhead_ratio: f32) -> MutableArray {
    let (min, max) = values
        .iter()
        .fold((i64::MAX, i64::MIN), |(min, max), &v| (min.min(v), max.max(v)));
    if min == 0 && max == 0 {
        return MutableArray::Null(NullMutable::new(values.len()));
    }
    let bits = if min < 0 {
        64
    } else {
        stowage_bits::bits_required(max)
    };
    let mut page = get_mutable(values.len(), bits, acceptable_overhead_ratio);
    let raw: Vec<u64> = values.iter().map(|&v| v as u64).collect();
    let mut i = 0;
    while i < raw.len() {
        i += page.bulk_set(i, &raw[i..]);
    }
    page
}

/// Immutable compressed sequence of `i64` values.
#[derive(Debug, Clone)]
pub struct PackedLongValues {
    encoding: Encoding,
    page_shift: u32,
    page_mask: u64,
    pages: Vec<MutableArray>,
    mins: Vec<i64>,
    averages: Vec<f32>,
    size: u64,
}

impl PackedLongValues {
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    #[inline]
    pub fn get(&self, index: u64) -> i64 {
        debug_assert!(index < self.size);
        let page = (index >> self.page_shift) as usize;
        let element = index & self.page_mask;
        self.decode(page, element, self.pages[page].get(element as usize))
    }

    /// Iterates over all values in order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            values: self,
            page: 0,
            buffer: Vec::new(),
            position: 0,
        }
    }

    #[inline]
    fn decode(&self, page: usize, element: u64, raw: u64) -> i64 {
        let raw = raw as i64;
        match self.encoding {
            Encoding::Plain => raw,
            Encoding::Delta => self.mins[page].wrapping_add(raw),
            Encoding::Monotonic => {
                expected(self.mins[page], self.averages[page], element).wrapping_add(raw)
            }
        }
    }
}

impl LongValues for PackedLongValues {
    fn get(&self, index: u64) -> i64 {
        PackedLongValues::get(self, index)
    }
}

impl<'a> IntoIterator for &'a PackedLongValues {
    type Item = i64;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

/// Forward iterator over a [`PackedLongValues`], decoding one page at a time.
pub struct Iter<'a> {
    values: &'a PackedLongValues,
    page: usize,
    buffer: Vec<i64>,
    position: usize,
}

impl Iter<'_> {
    fn fill_buffer(&mut self) {
        let values = self.values;
        let page_index = self.page;
        let page = &values.pages[page_index];
        let mut raw = vec![0u64; page.size()];
        let mut i = 0;
        while i < raw.len() {
            i += page.bulk_get(i, &mut raw[i..]);
        }
        self.buffer.clear();
        self.buffer.extend(
            raw.iter()
                .enumerate()
                .map(|(element, &v)| values.decode(page_index, element as u64, v)),
        );
        self.position = 0;
    }
}

impl Iterator for Iter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.position == self.buffer.len() {
            if self.page == self.values.pages.len() {
                return None;
            }
            self.fill_buffer();
            self.page += 1;
        }
        let value = self.buffer[self.position];
        self.position += 1;
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FAST;

    fn build(
        encoding: Encoding,
        config: PackedLongValuesConfig,
        values: &[i64],
    ) -> PackedLongValues {
        let mut builder = PackedLongValuesBuilder::new(encoding, config).unwrap();
        for &v in values {
            builder.add(v);
        }
        assert_eq!(builder.size(), values.len() as u64);
        let packed = builder.build();
        assert_eq!(packed.size(), values.len() as u64);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(packed.get(i as u64), v, "{encoding:?} index {i}");
        }
        assert_eq!(packed.iter().collect::<Vec<_>>(), values);
        packed
    }

    #[test]
    fn test_all_encodings_round_trip() {
        fastrand::seed(64);
        let config = PackedLongValuesConfig::default().with_page_size(64);
        let mut value = 0i64;
        let monotonic: Vec<i64> = (0..1000)
            .map(|_| {
                value += fastrand::i64(0..100);
                value
            })
            .collect();
        let random: Vec<i64> = (0..777).map(|_| fastrand::i64(-5000..5000)).collect();
        let extreme = [i64::MIN, i64::MAX, 0, -1, 1, i64::MAX, i64::MIN];
        for encoding in [Encoding::Plain, Encoding::Delta, Encoding::Monotonic] {
            build(encoding, config, &monotonic);
            build(encoding, config, &random);
            build(encoding, config, &extreme);
            build(encoding, config, &[]);
            build(
                encoding,
                config.with_acceptable_overhead_ratio(FAST),
                &monotonic,
            );
        }
    }

    #[test]
    fn test_zero_pages_use_no_bits() {
        let config = PackedLongValuesConfig::default().with_page_size(64);
        let mut values = vec![0i64; 128];
        values.extend(1..=64);
        let packed = build(Encoding::Plain, config, &values);
        assert_eq!(packed.num_pages(), 3);
        assert!(matches!(packed.pages[0], MutableArray::Null(_)));
        assert!(matches!(packed.pages[1], MutableArray::Null(_)));
        assert_eq!(packed.pages[2].bits_per_value(), 7);
    }

    #[test]
    fn test_page_widths_per_encoding() {
        let config = PackedLongValuesConfig::default().with_page_size(64);
        let values: Vec<i64> = (0..64).map(|i| 1_000_000 + 5 * i).collect();

        let plain = build(Encoding::Plain, config, &values);
        assert_eq!(plain.pages[0].bits_per_value(), 20);

        let delta = build(Encoding::Delta, config, &values);
        assert_eq!(delta.pages[0].bits_per_value(), 9);

        let monotonic = build(Encoding::Monotonic, config, &values);
        assert!(matches!(monotonic.pages[0], MutableArray::Null(_)));

        let negative = build(Encoding::Plain, config, &[-1, 2, 3]);
        assert_eq!(negative.pages[0].bits_per_value(), 64);
    }

    #[test]
    fn test_invalid_page_size() {
        let config = PackedLongValuesConfig::default();
        assert!(packed_builder(config.with_page_size(32)).is_err());
        assert!(delta_packed_builder(config.with_page_size(100)).is_err());
        assert!(monotonic_builder(config.with_page_size(1 << 21)).is_err());
        assert!(monotonic_builder(config).is_ok());
    }
}
